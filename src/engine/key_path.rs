use crate::{Configuration, LookupContext, Result};

/// The store-facing form of one logical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    /// The key after prefix stripping and separator translation, e.g. `db/password`.
    pub effective_key: String,
    /// The interpolated base URI, e.g. `/app/`.
    pub base_path: String,
    /// `base_path` followed by `effective_key`.
    pub store_path: String,
}

/// Returns the first prefix in list order that `key` starts with.
pub fn match_prefix<'a>(key: &str, prefixes: &'a [String]) -> Option<&'a str> {
    prefixes.iter().map(String::as_str).find(|prefix| key.starts_with(prefix))
}

/// Maps a logical key to its store path.
///
/// Returns `Ok(None)` when `key_prefixes` is configured and none matches: the
/// key is out of scope for this backend.
pub fn build<C>(raw_key: &str, config: &Configuration, ctx: &C) -> Result<Option<KeyPath>>
where
    C: LookupContext + ?Sized,
{
    let stripped = match &config.key_prefixes {
        Some(prefixes) => match match_prefix(raw_key, prefixes) {
            Some(prefix) => &raw_key[prefix.len()..],
            None => return Ok(None),
        },
        None => raw_key,
    };

    let effective_key = stripped.replace(&config.hierarchy_separator, &config.path_separator);
    let base_path = ctx.interpolate(&config.base_uri)?;
    let store_path = format!("{}{}", base_path, effective_key);

    Ok(Some(KeyPath {
        effective_key,
        base_path,
        store_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Facts, Session};

    fn scoped() -> Configuration {
        Configuration::new("/app/").with_key_prefixes(["dept::"])
    }

    #[test]
    fn test_strips_prefix_and_translates_separators() {
        let session = Session::new();
        let path = build("dept::db::password", &scoped(), &session).unwrap().unwrap();
        assert_eq!(path.effective_key, "db/password");
        assert_eq!(path.base_path, "/app/");
        assert_eq!(path.store_path, "/app/db/password");
    }

    #[test]
    fn test_no_matching_prefix_is_not_applicable() {
        let session = Session::new();
        assert_eq!(build("other::x", &scoped(), &session).unwrap(), None);
    }

    #[test]
    fn test_first_matching_prefix_wins() {
        let config = Configuration::new("/").with_key_prefixes(["a::", "a::b::"]);
        let session = Session::new();
        let path = build("a::b::c", &config, &session).unwrap().unwrap();
        assert_eq!(path.effective_key, "b/c");
    }

    #[test]
    fn test_strips_only_the_leading_occurrence() {
        let session = Session::new();
        let path = build("dept::dept::x", &scoped(), &session).unwrap().unwrap();
        assert_eq!(path.effective_key, "dept/x");
        assert_eq!(path.store_path, "/app/dept/x");
    }

    #[test]
    fn test_without_prefixes_every_key_applies() {
        let session = Session::new();
        let path = build("db::host", &Configuration::new("/app/"), &session).unwrap().unwrap();
        assert_eq!(path.store_path, "/app/db/host");
    }

    #[test]
    fn test_key_equal_to_prefix_maps_to_base_path() {
        let session = Session::new();
        let path = build("dept::", &scoped(), &session).unwrap().unwrap();
        assert_eq!(path.effective_key, "");
        assert_eq!(path.store_path, "/app/");
    }

    #[test]
    fn test_base_uri_is_interpolated_but_key_is_not() {
        let config = Configuration::new("/%{env}/");
        let session = Session::with_facts(Facts::new().with("env", "prod"));
        let path = build("x::%{env}", &config, &session).unwrap().unwrap();
        assert_eq!(path.base_path, "/prod/");
        assert_eq!(path.store_path, "/prod/x/%{env}");
    }

    #[test]
    fn test_custom_separators() {
        let mut config = Configuration::new("/app/");
        config.hierarchy_separator = ".".to_string();
        let session = Session::new();
        let path = build("db.password", &config, &session).unwrap().unwrap();
        assert_eq!(path.store_path, "/app/db/password");
    }

    #[test]
    fn test_matching_is_front_only() {
        assert_eq!(match_prefix("x::dept::y", &["dept::".to_string()]), None);
        assert_eq!(match_prefix("dept::y", &["dept::".to_string()]), Some("dept::"));
    }
}
