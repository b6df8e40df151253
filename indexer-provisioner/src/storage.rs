use serde::Serialize;

use crate::arn;
use crate::policy::PolicyStatement;
use crate::types::AccountContext;

pub const ABORT_INCOMPLETE_UPLOADS_AFTER_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketEncryption {
    S3Managed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub id: &'static str,
    pub enabled: bool,
    pub abort_incomplete_multipart_upload_after_days: u32,
}

/// Bucket for ad hoc file exchange between operators and the nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStorage {
    pub bucket_name: String,
    pub bucket_arn: String,
    pub encryption: BucketEncryption,
    pub enforce_ssl: bool,
    pub block_public_access: bool,
    pub versioned: bool,
    pub auto_delete_objects: bool,
    pub lifecycle_rules: Vec<LifecycleRule>,
}

impl SharedStorage {
    pub fn file_transfer(ctx: &AccountContext) -> Self {
        let bucket_name = format!("blockchain-indexer-file-transfer-{}-{}", ctx.account_id, ctx.region);
        Self {
            bucket_arn: arn::s3_bucket(&bucket_name),
            bucket_name,
            encryption: BucketEncryption::S3Managed,
            enforce_ssl: true,
            block_public_access: true,
            versioned: false,
            auto_delete_objects: true,
            lifecycle_rules: vec![LifecycleRule {
                id: "DeleteIncompleteMultipartUploads",
                enabled: true,
                abort_incomplete_multipart_upload_after_days: ABORT_INCOMPLETE_UPLOADS_AFTER_DAYS,
            }],
        }
    }

    /// Read-write on the bucket's objects plus listing the bucket itself.
    pub fn read_write_statements(&self) -> Vec<PolicyStatement> {
        vec![
            PolicyStatement::allow(
                "FileTransferObjects",
                ["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:AbortMultipartUpload"],
                format!("{}/*", self.bucket_arn),
            ),
            PolicyStatement::allow(
                "FileTransferBucket",
                ["s3:ListBucket", "s3:GetBucketLocation"],
                self.bucket_arn.clone(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_named_per_account_and_region() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let storage = SharedStorage::file_transfer(&ctx);
        assert_eq!(storage.bucket_name, "blockchain-indexer-file-transfer-111111111111-us-east-1");
        assert_eq!(storage.bucket_arn, "arn:aws:s3:::blockchain-indexer-file-transfer-111111111111-us-east-1");
        assert!(storage.enforce_ssl && storage.block_public_access && !storage.versioned);
        assert_eq!(storage.lifecycle_rules[0].abort_incomplete_multipart_upload_after_days, 7);
    }

    #[test]
    fn grants_stay_inside_bucket() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let storage = SharedStorage::file_transfer(&ctx);
        let stmts = storage.read_write_statements();
        assert_eq!(stmts.len(), 2);
        assert!(stmts.iter().all(|s| s.resource.starts_with(&storage.bucket_arn)));
        assert!(stmts[0].actions.contains("s3:PutObject"));
    }
}
