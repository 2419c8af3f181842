//! Line layout for fixed-width character displays.
//!
//! Character LCDs only render printable ASCII and never clear the rest of a
//! line on their own, so every line is written padded to the full width.

/// Fit `text` into exactly `width` cells: left-aligned, space-padded,
/// truncated when too long.
///
/// ```
/// use doorkeeper_hardware::text::pad_line;
///
/// assert_eq!(pad_line("LOCK!!", 8), "LOCK!!  ");
/// assert_eq!(pad_line("Welcome Admin!!", 7), "Welcome");
/// ```
pub fn pad_line(text: &str, width: usize) -> String {
    let mut line: String = text.chars().take(width).collect();
    let used = line.chars().count();
    line.extend(std::iter::repeat_n(' ', width - used));
    line
}

/// Replace anything the LCD cannot draw.
///
/// Control characters are dropped; other non-ASCII characters become `?`.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}
