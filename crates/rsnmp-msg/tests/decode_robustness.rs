//! Adversarial-input checks for the decoder: every byte sequence must
//! come back as `Ok` or a typed `CodecError`, never a panic or an
//! out-of-bounds access.

use rsnmp_msg::{CommunityMessage, SnmpMessage, V3Message};

/// Small deterministic PRNG (xorshift64*) so failures reproduce.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn fill(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let bytes = self.next().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[test]
fn random_buffers_never_panic() {
    let mut rng = Rng(0x5EED_CAFE_F00D_0001);
    let mut buf = vec![0u8; 4096];
    for round in 0..2000 {
        let len = (rng.next() as usize) % buf.len();
        rng.fill(&mut buf[..len]);
        // Bias toward plausible framing so the fuzz reaches deeper paths.
        if round % 2 == 0 && len > 2 {
            buf[0] = 0x30;
            buf[1] = (len - 2).min(0x7F) as u8;
        }
        let _ = SnmpMessage::unmarshal(&buf[..len]);
        let _ = CommunityMessage::unmarshal(&buf[..len]);
        let _ = V3Message::unmarshal(&buf[..len]);
    }
}

#[test]
fn every_truncation_of_a_valid_message_errors_cleanly() {
    use rsnmp_msg::{Pdu, PduType, Value, VarBind, Version};

    let msg = rsnmp_msg::CommunityMessage {
        version: Version::V2c,
        community: b"public".to_vec(),
        pdu: Pdu {
            pdu_type: PduType::Response,
            request_id: 1,
            error_status: rsnmp_msg::ErrorStatus::NoError,
            error_index: 0,
            non_repeaters: 0,
            max_repetitions: 0,
            varbinds: vec![
                VarBind::new(
                    ".1.3.6.1.2.1.1.1.0".parse().unwrap(),
                    Value::OctetString(b"Linux test 6.1".to_vec()),
                ),
                VarBind::new(
                    ".1.3.6.1.2.1.1.3.0".parse().unwrap(),
                    Value::TimeTicks(123_456),
                ),
            ],
        }
        .into(),
    };
    let bytes = msg.marshal().unwrap();
    for cut in 0..bytes.len() {
        assert!(
            CommunityMessage::unmarshal(&bytes[..cut]).is_err(),
            "prefix of {cut} bytes decoded successfully"
        );
    }
    assert!(CommunityMessage::unmarshal(&bytes).is_ok());
}

#[test]
fn bit_flips_never_panic() {
    use rsnmp_msg::{Pdu, PduType, VarBind, Version};

    let msg = rsnmp_msg::CommunityMessage {
        version: Version::V1,
        community: b"public".to_vec(),
        pdu: Pdu::request(
            PduType::GetRequest,
            42,
            vec![VarBind::null(".1.3.6.1.2.1.1.5.0".parse().unwrap())],
        )
        .into(),
    };
    let bytes = msg.marshal().unwrap();
    let mut work = bytes.clone();
    for i in 0..bytes.len() {
        for bit in 0..8 {
            work.copy_from_slice(&bytes);
            work[i] ^= 1 << bit;
            let _ = SnmpMessage::unmarshal(&work);
        }
    }
}
