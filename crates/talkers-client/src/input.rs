//! Outgoing message line protocol
//!
//! Messages are typed as `<to_id>:<content>`. Everything after the first
//! colon is the content, so bodies may themselves contain colons.

/// Split an input line into destination and content.
///
/// Returns `None` when the line has no colon separator or an empty
/// destination.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (to, content) = line.split_once(':')?;
    if to.is_empty() {
        return None;
    }
    Some((to, content))
}
