//! ARN synthesis. Every resource pattern handed to a policy statement is built
//! here from account/region context, never accepted pre-formatted from callers.

const PARTITION: &str = "aws";

pub fn kafka_cluster(region: &str, account: &str, cluster_name: &str, cluster_uuid: &str) -> String {
    format!("arn:{PARTITION}:kafka:{region}:{account}:cluster/{cluster_name}/{cluster_uuid}")
}

/// All topics of one cluster.
pub fn kafka_topics(region: &str, account: &str, cluster_name: &str) -> String {
    format!("arn:{PARTITION}:kafka:{region}:{account}:topic/{cluster_name}/*")
}

/// All consumer groups of one cluster.
pub fn kafka_groups(region: &str, account: &str, cluster_name: &str) -> String {
    format!("arn:{PARTITION}:kafka:{region}:{account}:group/{cluster_name}/*")
}

pub fn ec2_volumes(region: &str, account: &str) -> String {
    format!("arn:{PARTITION}:ec2:{region}:{account}:volume/*")
}

pub fn ec2_instances(region: &str, account: &str) -> String {
    format!("arn:{PARTITION}:ec2:{region}:{account}:instance/*")
}

pub fn s3_bucket(bucket: &str) -> String {
    format!("arn:{PARTITION}:s3:::{bucket}")
}

pub fn s3_object(bucket: &str, key: &str) -> String {
    format!("arn:{PARTITION}:s3:::{bucket}/{key}")
}
