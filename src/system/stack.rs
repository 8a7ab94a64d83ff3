use crate::provider::StackFrame;

/// Module label for frames whose symbol carries no Rust path.
pub const FOREIGN_MODULE: &str = "<foreign>";

const SKIPPED_PREFIXES: [&str; 2] = ["backtrace::", "rtsnap::system::stack::"];

/// Captures up to `max_depth` frames of the calling thread, innermost first.
pub fn capture_current(max_depth: usize) -> Vec<StackFrame> {
    let mut frames = Vec::with_capacity(max_depth);
    if max_depth == 0 {
        return frames;
    }

    backtrace::trace(|raw| {
        let mut resolved = None;
        backtrace::resolve_frame(raw, |symbol| {
            if resolved.is_none() {
                let name = symbol.name().map(|n| format!("{n:#}"));
                let file = symbol
                    .filename()
                    .and_then(|p| p.file_name())
                    .map(|f| f.to_string_lossy().into_owned());
                let line = symbol.lineno().and_then(|l| i32::try_from(l).ok());
                resolved = Some((name, file, line));
            }
        });

        let frame = match resolved {
            Some((Some(name), file, line)) => frame_from_symbol(&name, file, line),
            Some((None, file, line)) => StackFrame {
                class_name: FOREIGN_MODULE.to_string(),
                method_name: format!("{:p}", raw.ip()),
                native: file.is_none(),
                file_name: file,
                line_number: line,
            },
            None => StackFrame {
                class_name: FOREIGN_MODULE.to_string(),
                method_name: format!("{:p}", raw.ip()),
                file_name: None,
                line_number: None,
                native: true,
            },
        };

        if !is_capture_machinery(&frame.class_name) {
            frames.push(frame);
        }
        frames.len() < max_depth
    });

    frames
}

fn is_capture_machinery(module: &str) -> bool {
    SKIPPED_PREFIXES
        .iter()
        .any(|prefix| module.starts_with(prefix) || module == prefix.trim_end_matches("::"))
}

/// Splits a demangled symbol at its last `::` into module and function.
pub fn frame_from_symbol(symbol: &str, file: Option<String>, line: Option<i32>) -> StackFrame {
    match split_symbol(symbol) {
        Some((module, function)) => StackFrame {
            class_name: module.to_string(),
            method_name: function.to_string(),
            file_name: file,
            line_number: line,
            native: false,
        },
        None => StackFrame {
            class_name: FOREIGN_MODULE.to_string(),
            method_name: symbol.to_string(),
            native: file.is_none(),
            file_name: file,
            line_number: line,
        },
    }
}

// Only `::` outside generic brackets counts, so `<Vec<T> as Drop>::drop`
// splits after the closing `>`. The `>` of a `->` arrow closes nothing.
fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    let bytes = symbol.as_bytes();
    let mut depth = 0i32;
    let mut split = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    let at = split?;
    let (module, function) = (&symbol[..at], &symbol[at + 2..]);
    if module.is_empty() || function.is_empty() {
        return None;
    }
    Some((module, function))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_frame;

    #[test]
    fn rust_symbol_splits_on_last_path_segment() {
        let frame = frame_from_symbol("app::worker::run", Some("worker.rs".into()), Some(12));
        assert_eq!(format_frame(&frame), "app::worker.run(worker.rs:12)");
    }

    #[test]
    fn trait_impl_symbol_keeps_qualified_receiver() {
        let frame = frame_from_symbol("<alloc::vec::Vec<T> as core::ops::drop::Drop>::drop", None, None);
        assert_eq!(frame.class_name, "<alloc::vec::Vec<T> as core::ops::drop::Drop>");
        assert_eq!(frame.method_name, "drop");
        assert!(!frame.native);
    }

    #[test]
    fn generic_arguments_do_not_split() {
        let frame = frame_from_symbol("core::ptr::drop_in_place<std::thread::Packet<()>>", None, None);
        assert_eq!(frame.class_name, "core::ptr");
        assert_eq!(frame.method_name, "drop_in_place<std::thread::Packet<()>>");
    }

    #[test]
    fn fn_pointer_receiver_arrow_is_not_a_bracket() {
        let frame = frame_from_symbol(
            "<fn() -> i32 as core::ops::function::FnOnce<()>>::call_once",
            None,
            None,
        );
        assert_eq!(frame.class_name, "<fn() -> i32 as core::ops::function::FnOnce<()>>");
        assert_eq!(frame.method_name, "call_once");

        let nested = frame_from_symbol(
            "std::rt::lang_start<()>::{{closure}}<fn(u8) -> Result<(), E>>",
            None,
            None,
        );
        assert_eq!(nested.class_name, "std::rt::lang_start<()>");
        assert_eq!(nested.method_name, "{{closure}}<fn(u8) -> Result<(), E>>");
    }

    #[test]
    fn c_symbol_without_file_is_native() {
        let frame = frame_from_symbol("clone3", None, None);
        assert!(frame.native);
        assert_eq!(format_frame(&frame), "<foreign>.clone3(Native method)");
    }

    #[test]
    fn c_symbol_with_debug_info_is_not_native() {
        let frame = frame_from_symbol("start_thread", Some("pthread_create.c".into()), Some(442));
        assert!(!frame.native);
        assert_eq!(format_frame(&frame), "<foreign>.start_thread(pthread_create.c:442)");
    }

    #[test]
    fn capture_respects_depth() {
        assert!(capture_current(0).is_empty());
        assert!(capture_current(3).len() <= 3);
    }

    #[test]
    fn capture_skips_own_machinery() {
        for frame in capture_current(16) {
            assert!(!frame.class_name.starts_with("rtsnap::system::stack"));
            assert!(!frame.class_name.starts_with("backtrace::"));
        }
    }
}
