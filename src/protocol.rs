// Packet-level framing for the Feetech SCS/STS wire protocol, generalized
// from the teacher crate's single-motor `FeetechBus` framing
// (header/checksum/build_packet/read_response) to the group sync
// read/write primitives the bus core needs (spec.md §6.1).
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// (same framing as Dynamixel Protocol 1.0).

const HEADER: [u8; 2] = [0xFF, 0xFF];
pub const BROADCAST_ID: u8 = 0xFE;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    SyncRead = 0x82,
    SyncWrite = 0x83,
}

fn checksum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|&b| b as u32).sum();
    (!sum & 0xFF) as u8
}

/// Build a packet with header and checksum. `params` excludes id/length/instr.
pub fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let length = (params.len() + 2) as u8;
    let mut packet = Vec::with_capacity(6 + params.len());

    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push(length);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);

    let checksum_data = &packet[2..];
    packet.push(checksum(checksum_data));
    packet
}

#[derive(Debug)]
pub struct StatusPacket {
    pub id: u8,
    pub params: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid header: {0:02X?}")]
    BadHeader([u8; 2]),
    #[error("id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: u8, actual: u8 },
    #[error("checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },
    #[error("motor {id} returned error status 0x{status:02X}")]
    MotorError { id: u8, status: u8 },
}

/// Parse a status packet's body (everything after the 2-byte header),
/// validating id, checksum and the error byte.
pub fn parse_status(expected_id: u8, header: [u8; 2], id_length: [u8; 2], remaining: &[u8]) -> Result<StatusPacket, FrameError> {
    if header != HEADER {
        return Err(FrameError::BadHeader(header));
    }

    let id = id_length[0];
    let length = id_length[1] as usize;
    if id != expected_id {
        return Err(FrameError::IdMismatch {
            expected: expected_id,
            actual: id,
        });
    }
    if remaining.len() != length {
        return Err(FrameError::IdMismatch {
            expected: length as u8,
            actual: remaining.len() as u8,
        });
    }

    let mut checksum_data = vec![id, length as u8];
    checksum_data.extend_from_slice(&remaining[..remaining.len() - 1]);
    let expected_checksum = checksum(&checksum_data);
    let received_checksum = remaining[remaining.len() - 1];
    if expected_checksum != received_checksum {
        return Err(FrameError::ChecksumMismatch { id });
    }

    let error_status = remaining[0];
    if error_status != 0 {
        return Err(FrameError::MotorError {
            id,
            status: error_status,
        });
    }

    Ok(StatusPacket {
        id,
        params: remaining[1..remaining.len() - 1].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_reference_value() {
        let data = [1u8, 4, 0x03, 30, 0, 2];
        assert_eq!(checksum(&data), 215);
    }

    #[test]
    fn build_packet_has_expected_shape() {
        let packet = build_packet(1, Instruction::Ping, &[]);
        assert_eq!(packet.len(), 6);
        assert_eq!(packet[0], 0xFF);
        assert_eq!(packet[1], 0xFF);
        assert_eq!(packet[2], 1);
        assert_eq!(packet[3], 2);
        assert_eq!(packet[4], 0x01);
    }

    #[test]
    fn parse_status_detects_checksum_mismatch() {
        let mut packet = build_packet(5, Instruction::Read, &[42, 2]);
        let last = packet.len() - 1;
        packet[last] ^= 0xFF;

        let header = [packet[0], packet[1]];
        let id_length = [packet[2], packet[3]];
        let remaining = &packet[4..];
        let err = parse_status(5, header, id_length, remaining).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { id: 5 }));
    }
}
