use askama::Result;
use std::fmt::Display;

// CSS class for a status badge, e.g. "In Progress" -> "status-in-progress".
// Used as `|status_class` in the templates.
#[allow(clippy::unnecessary_wraps)]
pub fn status_class<T: Display>(s: T) -> Result<String> {
    Ok(format!("status-{}", s.to_string().to_lowercase().replace(' ', "-")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_is_kebab_cased() {
        assert_eq!(status_class("Waiting Parts").unwrap(), "status-waiting-parts");
        assert_eq!(status_class("New").unwrap(), "status-new");
    }
}
