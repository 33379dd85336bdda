/*!
 * Destination key construction
 */

use chrono::{DateTime, Local, TimeZone};
use uuid::Uuid;

/// Length of the random token used when no prefix is configured
pub const RANDOM_PREFIX_LEN: usize = 8;

/// Leading segment of every uploaded file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixPolicy {
    /// Configured literal, e.g. the host name
    Literal(String),
    /// Fresh random token per key
    Random,
}

impl PrefixPolicy {
    pub fn from_option(prefix: Option<&str>) -> Self {
        match prefix {
            Some(p) if !p.is_empty() => PrefixPolicy::Literal(p.to_string()),
            _ => PrefixPolicy::Random,
        }
    }

    fn resolve(&self) -> String {
        match self {
            PrefixPolicy::Literal(p) => p.clone(),
            PrefixPolicy::Random => random_token(),
        }
    }
}

/// 8 lowercase hex characters from a v4 UUID with the dashes stripped
pub fn random_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(RANDOM_PREFIX_LEN);
    token
}

/// Builds `<app_dir>/<date partition>/<prefix>_<base name>` keys.
#[derive(Debug, Clone)]
pub struct KeyNamer {
    app_dir: String,
    datetime_format: String,
    prefix: PrefixPolicy,
}

impl KeyNamer {
    /// `datetime_format` must already be validated, see `ShipConfig::validate`
    pub fn new(app_dir: &str, datetime_format: &str, prefix: PrefixPolicy) -> Self {
        Self {
            app_dir: app_dir.trim_matches('/').to_string(),
            datetime_format: datetime_format.to_string(),
            prefix,
        }
    }

    /// Key for `base_name` partitioned by the current local time
    pub fn build_key(&self, base_name: &str) -> String {
        self.build_key_at(base_name, &Local::now())
    }

    pub fn build_key_at<Tz>(&self, base_name: &str, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}/{}/{}_{}",
            self.app_dir,
            now.format(&self.datetime_format),
            self.prefix.resolve(),
            base_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_key_with_literal_prefix() {
        let namer = KeyNamer::new(
            "app",
            "%Y/%m/%d/%H/%M",
            PrefixPolicy::Literal("host1".to_string()),
        );
        assert_eq!(
            namer.build_key_at("access.log.1", &fixed_time()),
            "app/2024/01/02/03/04/host1_access.log.1"
        );
    }

    #[test]
    fn test_key_with_random_prefix() {
        let namer = KeyNamer::new("app", "%Y/%m/%d/%H/%M", PrefixPolicy::Random);
        let key = namer.build_key_at("access.log.1.gz", &fixed_time());

        let name = key.strip_prefix("app/2024/01/02/03/04/").unwrap();
        let (prefix, base) = name.split_once('_').unwrap();
        assert_eq!(base, "access.log.1.gz");
        assert_eq!(prefix.len(), RANDOM_PREFIX_LEN);
        assert!(prefix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_random_prefix_is_fresh_per_key() {
        let namer = KeyNamer::new("app", "%Y", PrefixPolicy::Random);
        let a = namer.build_key_at("x", &fixed_time());
        let b = namer.build_key_at("x", &fixed_time());
        // 32 bits of randomness; a clash here is not a realistic outcome
        assert_ne!(a, b);
    }

    #[test]
    fn test_custom_datetime_format() {
        let namer = KeyNamer::new(
            "web",
            "dt=%Y-%m-%d",
            PrefixPolicy::Literal("h".to_string()),
        );
        assert_eq!(
            namer.build_key_at("a.snappy", &fixed_time()),
            "web/dt=2024-01-02/h_a.snappy"
        );
    }

    #[test]
    fn test_app_dir_slashes_trimmed() {
        let namer = KeyNamer::new("/app/", "%Y", PrefixPolicy::Literal("p".to_string()));
        assert_eq!(namer.build_key_at("f", &fixed_time()), "app/2024/p_f");
    }

    #[test]
    fn test_prefix_policy_from_option() {
        assert_eq!(
            PrefixPolicy::from_option(Some("host1")),
            PrefixPolicy::Literal("host1".to_string())
        );
        assert_eq!(PrefixPolicy::from_option(Some("")), PrefixPolicy::Random);
        assert_eq!(PrefixPolicy::from_option(None), PrefixPolicy::Random);
    }

    #[test]
    fn test_build_key_uses_local_time() {
        let namer = KeyNamer::new("app", "%Y", PrefixPolicy::Literal("p".to_string()));
        let key = namer.build_key("f");
        assert!(key.starts_with("app/"));
        assert!(key.ends_with("/p_f"));
    }
}
