use rand::{distributions::Alphanumeric, thread_rng, Rng};
use reqwest::Url;
use std::{env, fs, path::PathBuf};

pub const SEARCH_PATH: &str = "/rest/searchv3/1.0/cqlSearch";
pub const ATTACHMENT_MARKER: &str = "/download/attachments/";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const UNKNOWN_TITLE: &str = "unknown";
pub const PREVIEW_LEN: usize = 500;

/// Drops everything from the first `?` on.
pub fn strip_query(path: &str) -> &str {
    match path.split_once('?') {
        Some((p, _)) => p,
        None => path,
    }
}

/// Resolves a (possibly relative) link against the server base, without its
/// query string.
pub fn resolve_url(base_url: &Url, href: &str) -> Option<Url> {
    base_url.join(strip_query(href)).ok()
}

pub fn sanitize_title(title: &str) -> String {
    let t = title.replace(['/', '\\'], "_");
    match t.trim() {
        "" | "." | ".." => UNKNOWN_TITLE.into(),
        _ => t,
    }
}

/// Last path segment of `url`, percent-decoded and made safe to use as a
/// file name. `None` when the url ends with a slash.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = match urlencoding::decode(segment) {
        Ok(d) => d.into_owned(),
        Err(_) => segment.to_string(),
    };
    let name = decoded.replace(['/', '\\'], "_");
    match name.as_str() {
        "." | ".." => None,
        _ => Some(name),
    }
}

/// First `PREVIEW_LEN` characters of a response body, for log lines.
pub fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_LEN).collect()
}

pub fn get_random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn create_random_tmp_folder() -> std::io::Result<PathBuf> {
    let rand_folder_name: String = get_random_string(11);

    let path = env::temp_dir().join(format!("harvester-{}", rand_folder_name));
    fs::create_dir(&path)?;
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;

    fn base() -> Url {
        Url::parse("http://host:8090").unwrap()
    }

    #[test]
    fn strips_query_suffix() {
        assert_eq!(strip_query("/pages/view/123?x=1"), "/pages/view/123");
        assert_eq!(strip_query("/pages/view/123"), "/pages/view/123");
        assert_eq!(strip_query("?only"), "");
    }

    #[test]
    fn resolves_webui_path_against_base() {
        let u = resolve_url(&base(), "/pages/view/123?x=1").unwrap();
        assert_eq!(u.to_string(), "http://host:8090/pages/view/123");
    }

    #[test]
    fn absolute_links_keep_their_host() {
        let u = resolve_url(&base(), "https://cdn.example.com/a/b.png?v=3").unwrap();
        assert_eq!(u.to_string(), "https://cdn.example.com/a/b.png");
    }

    #[test]
    fn sanitizes_path_separators() {
        assert_eq!(sanitize_title("Q1/Q2 plans"), "Q1_Q2 plans");
        assert_eq!(sanitize_title(r"a\b"), "a_b");
        assert_eq!(sanitize_title(".."), UNKNOWN_TITLE);
        assert_eq!(sanitize_title("  "), UNKNOWN_TITLE);
    }

    #[test]
    fn filename_is_last_segment() {
        let u = Url::parse("http://host:8090/download/attachments/456/file.txt").unwrap();
        assert_eq!(filename_from_url(&u).as_deref(), Some("file.txt"));

        let u = Url::parse("http://host:8090/download/attachments/456/my%20report.pdf").unwrap();
        assert_eq!(filename_from_url(&u).as_deref(), Some("my report.pdf"));

        let u = Url::parse("http://host:8090/download/attachments/456/..%2Fetc").unwrap();
        assert_eq!(filename_from_url(&u).as_deref(), Some(".._etc"));

        let u = Url::parse("http://host:8090/download/attachments/456/").unwrap();
        assert_eq!(filename_from_url(&u), None);
    }

    #[test]
    fn preview_is_char_bounded() {
        let body = "é".repeat(PREVIEW_LEN + 10);
        assert_eq!(preview(&body).chars().count(), PREVIEW_LEN);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn creates_a_random_folder() {
        let p = create_random_tmp_folder().unwrap();
        assert!(p.exists());
        fs::remove_dir(p).unwrap();
    }
}
