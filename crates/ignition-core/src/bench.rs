/// Single-byte bench command.
///
/// `h`/`l` drive the simulated trigger, `1`-`4` activate a position sensor and
/// `q`,`r`,`s`,`t` deactivate cylinders 1-4. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchCommand {
    TriggerHigh,
    TriggerLow,
    PositionActive(usize),
    PositionInactive(usize),
}

impl BenchCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'h' => Some(BenchCommand::TriggerHigh),
            b'l' => Some(BenchCommand::TriggerLow),
            b'1'..=b'4' => Some(BenchCommand::PositionActive((byte - b'1') as usize)),
            b'q'..=b't' => Some(BenchCommand::PositionInactive((byte - b'q') as usize)),
            _ => None,
        }
    }

    /// Decode a byte stream, skipping unrecognised bytes.
    pub fn decode(bytes: &[u8]) -> impl Iterator<Item = BenchCommand> + '_ {
        bytes.iter().copied().filter_map(BenchCommand::from_byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CYLINDER_COUNT;

    #[test]
    fn digits_activate_zero_based_cylinder() {
        assert_eq!(BenchCommand::from_byte(b'1'), Some(BenchCommand::PositionActive(0)));
        assert_eq!(BenchCommand::from_byte(b'3'), Some(BenchCommand::PositionActive(2)));
        assert_eq!(BenchCommand::from_byte(b'4'), Some(BenchCommand::PositionActive(3)));
    }

    #[test]
    fn letters_deactivate_positionally() {
        assert_eq!(BenchCommand::from_byte(b'q'), Some(BenchCommand::PositionInactive(0)));
        assert_eq!(BenchCommand::from_byte(b's'), Some(BenchCommand::PositionInactive(2)));
        assert_eq!(BenchCommand::from_byte(b't'), Some(BenchCommand::PositionInactive(3)));
    }

    #[test]
    fn unknown_bytes_are_ignored() {
        for b in [b'x', b'0', b'5', b'p', b'u', b'H', b'\n', b' '] {
            assert_eq!(BenchCommand::from_byte(b), None, "byte {:?}", b as char);
        }
    }

    #[test]
    fn decode_skips_noise() {
        let cmds: Vec<_> = BenchCommand::decode(b"h3x\r\ns").collect();
        assert_eq!(
            cmds,
            vec![
                BenchCommand::TriggerHigh,
                BenchCommand::PositionActive(2),
                BenchCommand::PositionInactive(2),
            ]
        );
    }

    #[test]
    fn every_cylinder_has_an_on_and_off_byte() {
        let on: Vec<_> = BenchCommand::decode(b"1234").collect();
        let off: Vec<_> = BenchCommand::decode(b"qrst").collect();
        for i in 0..CYLINDER_COUNT {
            assert_eq!(on[i], BenchCommand::PositionActive(i));
            assert_eq!(off[i], BenchCommand::PositionInactive(i));
        }
    }
}
