//! Filename sanitization for dataset artifact names.
//!
//! `spec.md` §6: any character outside `[A-Za-z0-9._- ]` is replaced with
//! `_`, with no further collapsing or trimming — matching
//! `batch_scheduler.py::_sanitize_filename` exactly, rather than the
//! stricter Linux-name rules a general-purpose downloader would apply.

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_disallowed_characters() {
        assert_eq!(sanitize_filename("job/one:site#1"), "job_one_site_1");
    }

    #[test]
    fn keeps_allowed_punctuation_and_spaces() {
        assert_eq!(sanitize_filename("job one_site-1.nc"), "job one_site-1.nc");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize_filename("  site 1  "), "site 1");
    }
}
