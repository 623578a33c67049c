//! `Content-Disposition` handling for document downloads.

use axum::http::HeaderValue;
use regex::Regex;
use std::sync::OnceLock;

/// Matches the first `filename…=` parameter and its value, quoted or bare.
fn filename_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(filename[^;=\n]*)=(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#)
                .inspect_err(|e| tracing::error!(error = %e, "Invalid Content-Disposition pattern"))
                .ok()
        })
        .as_ref()
}

/// Extracts the file name from a `Content-Disposition` value.
///
/// The first `filename` parameter wins. An extended `filename*` value in
/// `UTF-8''` form is percent-decoded. Returns `None` when there is no
/// usable name.
#[must_use]
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let captures = filename_pattern()?.captures(value)?;
    let param = captures.get(1)?.as_str();
    let raw = (2..=4)
        .find_map(|i| captures.get(i))
        .map(|m| m.as_str().trim())?;

    let name = match (param.trim_end().ends_with('*'), split_extended(raw)) {
        (true, Some(encoded)) => urlencoding::decode(encoded)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
        _ => raw.to_string(),
    };

    (!name.is_empty()).then_some(name)
}

/// Strips the `charset'language'` prefix of an RFC 5987 value.
fn split_extended(raw: &str) -> Option<&str> {
    let (charset, rest) = raw.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;
    charset.eq_ignore_ascii_case("utf-8").then_some(encoded)
}

/// Builds the `Content-Disposition` sent to the browser.
///
/// Names that are not plain ASCII also get a `filename*` parameter so the
/// browser can restore them.
#[must_use]
pub fn attachment(name: &str) -> HeaderValue {
    let plain: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    let value = if plain == name {
        format!("attachment; filename=\"{plain}\"")
    } else {
        format!(
            "attachment; filename=\"{plain}\"; filename*=UTF-8''{}",
            urlencoding::encode(name)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_name_with_space() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="rapport final.pdf""#).as_deref(),
            Some("rapport final.pdf")
        );
    }

    #[test]
    fn bare_and_single_quoted_names() {
        assert_eq!(
            filename_from_disposition("attachment; filename=notes.txt; size=12").as_deref(),
            Some("notes.txt")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename='bilan.xlsx'").as_deref(),
            Some("bilan.xlsx")
        );
    }

    #[test]
    fn missing_parameter_falls_back() {
        let metadata_name = "releve.pdf";
        let name = filename_from_disposition("attachment")
            .unwrap_or_else(|| metadata_name.to_string());
        assert_eq!(name, "releve.pdf");
        assert!(filename_from_disposition("attachment; filename=").is_none());
        assert!(filename_from_disposition(r#"attachment; filename="""#).is_none());
    }

    #[test]
    fn extended_name_is_percent_decoded() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf").as_deref(),
            Some("résumé.pdf")
        );
    }

    #[test]
    fn first_parameter_wins() {
        assert_eq!(
            filename_from_disposition(
                "attachment; filename=\"plain.pdf\"; filename*=UTF-8''accentu%C3%A9.pdf"
            )
            .as_deref(),
            Some("plain.pdf")
        );
    }

    #[test]
    fn ascii_attachment_header() {
        assert_eq!(
            attachment("rapport final.pdf"),
            "attachment; filename=\"rapport final.pdf\""
        );
    }

    #[test]
    fn non_ascii_attachment_header_carries_extended_name() {
        let header = attachment("résumé \"v2\".pdf");
        let text = header.to_str().expect("ascii header");
        assert!(text.starts_with("attachment; filename=\"r_sum_ _v2_.pdf\""));
        assert!(text.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22v2%22.pdf"));
        assert_eq!(
            filename_from_disposition(text).as_deref(),
            Some("r_sum_ _v2_.pdf")
        );
    }
}
