/// Best-effort text extraction for the keyword heuristic
///
/// Text formats are decoded as lossy UTF-8. Anything else (PDF, Office
/// containers) is reduced to its printable ASCII runs of at least
/// [`MIN_RUN`] characters.

/// Shortest ASCII run kept from binary formats
pub const MIN_RUN: usize = 4;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "rtf"];

pub fn extract_text(data: &[u8], extension: Option<&str>) -> String {
    let is_text = extension.is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));

    if is_text {
        String::from_utf8_lossy(data).into_owned()
    } else {
        ascii_runs(data, MIN_RUN)
    }
}

/// Printable ASCII runs of at least `min_len`, joined by spaces
pub fn ascii_runs(data: &[u8], min_len: usize) -> String {
    let mut out = String::new();
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.len() >= min_len {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(run);
        }
        run.clear();
    };

    for &byte in data {
        if byte.is_ascii_graphic() || byte == b' ' {
            run.push(byte as char);
        } else {
            flush(&mut run, &mut out);
        }
    }
    flush(&mut run, &mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_formats_decoded() {
        let text = extract_text("Mission statement – approved".as_bytes(), Some("MD"));
        assert_eq!(text, "Mission statement – approved");

        let lossy = extract_text(&[b'o', b'k', 0xff], Some("txt"));
        assert_eq!(lossy, "ok\u{fffd}");
    }

    #[test]
    fn test_binary_runs() {
        let data = b"%PDF\x00\x01ab\x02faculty credentials\x03xyz\x04";
        assert_eq!(extract_text(data, Some("pdf")), "%PDF faculty credentials");
    }

    #[test]
    fn test_unknown_extension_treated_as_binary() {
        assert_eq!(extract_text(b"abc\x00defg", None), "defg");
    }
}
