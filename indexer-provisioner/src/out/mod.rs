use crate::stack::ComposedStack;
use anyhow::Result;

pub mod http;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutMode {
    Stdout,
    Http,
}

impl OutMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "http" => OutMode::Http,
            _ => OutMode::Stdout,
        }
    }
}

pub fn render_json(stack: &ComposedStack) -> Result<String> {
    Ok(serde_json::to_string_pretty(stack)?)
}

pub fn emit_stdout(stack: &ComposedStack) -> Result<()> {
    println!("{}", render_json(stack)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_lenient() {
        assert_eq!(OutMode::parse("HTTP "), OutMode::Http);
        assert_eq!(OutMode::parse(""), OutMode::Stdout);
        assert_eq!(OutMode::parse("file"), OutMode::Stdout);
    }
}
