use doglink_frame::packet::COMMAND_LEN;
use serde::Serialize;

/// First plaintext byte of every well-formed control command.
pub const COMMAND_HEADER: u8 = 0x04;

/// `digital` bit: engage the brake.
pub const BRAKE_BIT: u8 = 0x01;

/// `digital` bit: run the secondary peripheral.
pub const PERIPHERAL_BIT: u8 = 0x02;

/// A decrypted FARMER control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveCommand {
    pub direction_speed: u8,
    pub turn: u8,
    pub brake: bool,
    pub peripheral: bool,
}

impl DriveCommand {
    /// Parse decrypted command bytes.
    ///
    /// `None` when the header is not the command tag, which is how a key
    /// stream that has fallen out of step shows up.
    pub fn from_plaintext(plain: &[u8]) -> Option<Self> {
        match plain {
            [COMMAND_HEADER, direction_speed, turn, digital] => Some(Self {
                direction_speed: *direction_speed,
                turn: *turn,
                brake: digital & BRAKE_BIT != 0,
                peripheral: digital & PERIPHERAL_BIT != 0,
            }),
            _ => None,
        }
    }

    pub fn to_plaintext(&self) -> [u8; COMMAND_LEN] {
        let mut digital = 0;
        if self.brake {
            digital |= BRAKE_BIT;
        }
        if self.peripheral {
            digital |= PERIPHERAL_BIT;
        }
        [COMMAND_HEADER, self.direction_speed, self.turn, digital]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digital_bits() {
        let cmd = DriveCommand::from_plaintext(&[0x04, 200, 90, 0x03]).unwrap();
        assert_eq!(cmd.direction_speed, 200);
        assert_eq!(cmd.turn, 90);
        assert!(cmd.brake);
        assert!(cmd.peripheral);

        let cmd = DriveCommand::from_plaintext(&[0x04, 0, 0, 0x02]).unwrap();
        assert!(!cmd.brake);
        assert!(cmd.peripheral);
    }

    #[test]
    fn wrong_header_or_length_rejected() {
        assert!(DriveCommand::from_plaintext(&[0x05, 1, 2, 3]).is_none());
        assert!(DriveCommand::from_plaintext(&[0x04, 1, 2]).is_none());
    }

    #[test]
    fn plaintext_roundtrip() {
        let cmd = DriveCommand {
            direction_speed: 127,
            turn: 3,
            brake: true,
            peripheral: false,
        };
        assert_eq!(cmd.to_plaintext(), [0x04, 127, 3, 0x01]);
        assert_eq!(DriveCommand::from_plaintext(&cmd.to_plaintext()), Some(cmd));
    }
}
