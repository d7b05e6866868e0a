//! Port name ordering

/// Numeric part of a port name: all its digits read as one number
fn port_number(name: &str) -> Option<u64> {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Sort port names by their number (`COM2` before `COM10`); names without
/// digits go last, in alphabetical order
pub fn sort_port_names(names: &mut [String]) {
    names.sort_by(|a, b| match (port_number(a), port_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}
