//! Version information

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn format_version_info() -> String {
    format!("sitedesk v{}", CURRENT_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version_info() {
        assert_eq!(
            format_version_info(),
            format!("sitedesk v{}", env!("CARGO_PKG_VERSION"))
        );
    }
}
