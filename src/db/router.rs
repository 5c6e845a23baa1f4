//! Read/write routing.

use crate::models::Access;
use crate::sql::Verb;

/// Pick the connection for a validated statement.
///
/// Reads go to the read-only handle unless the caller forces the read-write
/// one (e.g. to read its own writes). Everything else goes to read-write.
pub fn route(verb: Verb, force_read_write: bool) -> Access {
    if verb.is_read() && !force_read_write {
        Access::ReadOnly
    } else {
        Access::ReadWrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_goes_to_read_only() {
        assert_eq!(route(Verb::Select, false), Access::ReadOnly);
    }

    #[test]
    fn test_forced_select_goes_to_read_write() {
        assert_eq!(route(Verb::Select, true), Access::ReadWrite);
    }

    #[test]
    fn test_writes_go_to_read_write() {
        for verb in [
            Verb::Insert,
            Verb::Update,
            Verb::Delete,
            Verb::Create,
            Verb::Truncate,
        ] {
            assert_eq!(route(verb, false), Access::ReadWrite);
        }
    }
}
