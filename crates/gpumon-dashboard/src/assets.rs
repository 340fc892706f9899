//! Static page files served under `/web/`.
//!
//! The stylesheet and the scroll hook are compiled in; a directory given at
//! startup may shadow them by file name.

const STYLE_CSS: &str = include_str!("../web/style.css");
const PIN_JS: &str = include_str!("../web/pin.js");

pub const STYLESHEET: &str = "style.css";
pub const SCROLL_SCRIPT: &str = "pin.js";

/// Content type by extension; `None` for anything the page never loads.
pub fn content_type(name: &str) -> Option<&'static str> {
    match name.rsplit_once('.')?.1 {
        "css" => Some("text/css; charset=utf-8"),
        "js" => Some("application/javascript; charset=utf-8"),
        _ => None,
    }
}

/// A plain file name: no separators, no leading dot.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

pub fn bundled(name: &str) -> Option<&'static str> {
    match name {
        STYLESHEET => Some(STYLE_CSS),
        SCROLL_SCRIPT => Some(PIN_JS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type("style.css"), Some("text/css; charset=utf-8"));
        assert_eq!(
            content_type("pin.js"),
            Some("application/javascript; charset=utf-8")
        );
        assert_eq!(content_type("secrets.txt"), None);
        assert_eq!(content_type("Makefile"), None);
    }

    #[test]
    fn test_safe_names() {
        assert!(is_safe_name("style.css"));
        assert!(!is_safe_name("../Cargo.toml"));
        assert!(!is_safe_name(".env"));
        assert!(!is_safe_name("a/b.css"));
        assert!(!is_safe_name(""));
    }

    #[test]
    fn test_bundled_files_carry_markers() {
        let css = bundled(STYLESHEET).unwrap();
        for class in [
            "illegal_user",
            "illegal_booking",
            "illegal_maxgpu",
            "illegal_maxday",
            "nav-at-top",
        ] {
            assert!(css.contains(class), "stylesheet lacks {class}");
        }
        let js = bundled(SCROLL_SCRIPT).unwrap();
        assert!(js.contains("/header-position"));
        assert!(js.contains("head-line"));
        assert!(bundled("other.js").is_none());
    }
}
