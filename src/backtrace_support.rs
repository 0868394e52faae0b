use backtrace::Backtrace;

use crate::protocol::Frame;
use crate::source::{source_context, CONTEXT_LINES};

/// Frames whose function name starts with one of these prefixes are
/// machinery around the capture call and are trimmed from traces.
const WELL_KNOWN_INTERNAL_PREFIXES: &[&str] = &[
    "streply::",
    "backtrace::",
    "std::panicking::",
    "std::panic::",
    "core::panicking::",
    "std::rt::",
    "std::sys::",
    "rust_begin_unwind",
    "__rust_begin_short_backtrace",
    "__rust_try",
    "_start",
    "main",
];

fn is_internal_frame(function: &str) -> bool {
    WELL_KNOWN_INTERNAL_PREFIXES.iter().any(|prefix| {
        if prefix.ends_with("::") {
            function.starts_with(prefix)
        } else {
            function == *prefix
        }
    })
}

/// Strips the trailing hash rustc appends to symbol names.
fn demangled_name(name: &backtrace::SymbolName<'_>) -> String {
    let name = name.to_string();
    match name.rfind("::h") {
        Some(idx) if name[idx + 3..].chars().all(|c| c.is_ascii_hexdigit()) => {
            name[..idx].to_string()
        }
        _ => name,
    }
}

/// Captures the current stack as wire frames, capture point first.
///
/// Each frame is annotated with surrounding source text when the file is
/// locally readable.  File paths are reported relative to the working
/// directory when they live under it.
pub(crate) fn current_stacktrace() -> Vec<Frame> {
    let cwd = std::env::current_dir().unwrap_or_default();
    let backtrace = Backtrace::new();
    let mut frames = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            let function = symbol.name().as_ref().map(demangled_name);
            if let Some(ref function) = function {
                if is_internal_frame(function) {
                    continue;
                }
            }
            let (file, line) = match (symbol.filename(), symbol.lineno()) {
                (Some(file), Some(line)) => (file, line),
                // frames without debug info carry no useful location
                _ => continue,
            };

            let file = file
                .strip_prefix(&cwd)
                .unwrap_or(file)
                .to_string_lossy()
                .into_owned();

            frames.push(Frame {
                source: source_context(&file, line, CONTEXT_LINES),
                file,
                line,
                function,
                class_name: None,
                args: Vec::new(),
            });
        }
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_frames_are_trimmed() {
        assert!(is_internal_frame("streply::client::Client::capture_error"));
        assert!(is_internal_frame("backtrace::capture::Backtrace::new"));
        assert!(!is_internal_frame("my_app::handler::process"));
    }

    #[test]
    fn test_demangled_name_strips_hash() {
        let raw = "my_app::run::h1a2b3c4d5e6f7890";
        assert_eq!(
            demangled_name(&backtrace::SymbolName::new(raw.as_bytes())),
            "my_app::run"
        );
        let plain = "my_app::run";
        assert_eq!(
            demangled_name(&backtrace::SymbolName::new(plain.as_bytes())),
            "my_app::run"
        );
    }
}
