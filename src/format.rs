use crate::provider::StackFrame;

pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Which of the four frame renderings applies. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameForm {
    Native,
    FileAndLine,
    FileOnly,
    Unknown,
}

pub fn frame_form(frame: &StackFrame) -> FrameForm {
    if frame.native {
        return FrameForm::Native;
    }
    match (&frame.file_name, frame.line_number) {
        (Some(_), Some(line)) if line >= 0 => FrameForm::FileAndLine,
        (Some(_), _) => FrameForm::FileOnly,
        (None, _) => FrameForm::Unknown,
    }
}

pub fn format_frame(frame: &StackFrame) -> String {
    let class = &frame.class_name;
    let method = &frame.method_name;
    match frame_form(frame) {
        FrameForm::Native => format!("{class}.{method}(Native method)"),
        FrameForm::FileAndLine => {
            let file = frame.file_name.as_deref().unwrap_or_default();
            let line = frame.line_number.unwrap_or_default();
            format!("{class}.{method}({file}:{line})")
        }
        FrameForm::FileOnly => {
            let file = frame.file_name.as_deref().unwrap_or_default();
            format!("{class}.{method}({file})")
        }
        FrameForm::Unknown => format!("{class}.{method}(Unknown source)"),
    }
}

/// Splits a path list on `separator`.
///
/// Trailing empty entries are dropped while interior ones are kept, and an
/// empty input yields a single empty entry.
pub fn split_search_path(path_list: &str, separator: char) -> Vec<String> {
    if path_list.is_empty() {
        return vec![String::new()];
    }
    let mut entries: Vec<String> = path_list.split(separator).map(str::to_string).collect();
    while entries.last().is_some_and(|e| e.is_empty()) {
        entries.pop();
    }
    entries
}
