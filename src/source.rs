use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::protocol::Map;

/// How many lines of surrounding source text a frame carries at most on
/// each side of the target line.
pub(crate) const CONTEXT_LINES: u32 = 10;

/// Reads the source lines surrounding `line` from `file`, keyed by their
/// 1-based line numbers.
///
/// This is strictly best effort: an unreadable file yields an empty map and
/// never an error.
pub(crate) fn source_context(file: &str, line: u32, context_lines: u32) -> Map<u32, String> {
    let mut output = Map::new();
    let path = Path::new(file);

    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return output,
    };

    let first = line.saturating_sub(context_lines).max(1);
    let last = line.saturating_add(context_lines);

    for (idx, text) in BufReader::new(file).lines().enumerate() {
        let lineno = idx as u32 + 1;
        if lineno > last {
            break;
        }
        if lineno < first {
            continue;
        }
        match text {
            Ok(text) => {
                output.insert(lineno, text);
            }
            // non-utf8 or truncated file, keep what we have
            Err(_) => break,
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_source_context_window() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("streply-source-test-{}.txt", std::process::id()));
        let mut file = std::fs::File::create(&tmp).unwrap();
        for n in 1..=40 {
            writeln!(file, "line {}", n).unwrap();
        }

        let context = source_context(tmp.to_str().unwrap(), 20, 3);
        assert_eq!(context.len(), 7);
        assert_eq!(context.get(&17).map(String::as_str), Some("line 17"));
        assert_eq!(context.get(&23).map(String::as_str), Some("line 23"));
        assert!(!context.contains_key(&16));
        assert!(!context.contains_key(&24));

        let context = source_context(tmp.to_str().unwrap(), 2, 5);
        assert_eq!(context.iter().next().map(|(n, _)| *n), Some(1));

        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn test_missing_file_is_empty() {
        assert!(source_context("definitely/not/a/file.rs", 10, 5).is_empty());
    }
}
