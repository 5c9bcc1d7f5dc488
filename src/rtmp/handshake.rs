// RTMP handshake utils

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::Sha256;

use crate::log::Logger;
use crate::log_error;

use super::{GLOB_FMS_KEY, RTMP_SIG_SIZE, RTMP_VERSION};

/// Length of a SHA-256 digest
pub const SHA256_DIGEST_LEN: usize = 32;

/// Client version threshold after which the digest moves to the
/// second half of the signature (scheme 1)
const HANDSHAKE_SCHEME_1_VERSION: u32 = 0x8000_0302;

/// Calculates HMAC-SHA256
///
/// # Arguments
///
/// * `message` - Message to authenticate
/// * `key` - HMAC key
pub fn calc_hmac(message: &[u8], key: &[u8]) -> Vec<u8> {
    let mut mac: Hmac<Sha256> = Hmac::new_from_slice(key).expect("HMAC can take key of any size");

    mac.update(message);

    mac.finalize().into_bytes().to_vec()
}

/// Detects the digest scheme from a client signature (C1)
///
/// # Arguments
///
/// * `client_signature` - The 1536 byte client signature
///
/// # Return value
///
/// Returns 0 for players older than 10.0.32.18, 1 for newer players
pub fn detect_handshake_scheme(client_signature: &[u8]) -> u8 {
    if client_signature.len() < 8 {
        return 0;
    }

    let client_version = BigEndian::read_u32(&client_signature[4..8]);

    if client_version >= HANDSHAKE_SCHEME_1_VERSION {
        1
    } else {
        0
    }
}

/// Computes the digest offset of a 1536 byte handshake signature
///
/// # Arguments
///
/// * `msg` - The signature
/// * `handshake_scheme` - Digest scheme (0 or 1)
///
/// # Return value
///
/// The offset of the 32 byte digest within the signature
pub fn get_digest_offset(msg: &[u8], handshake_scheme: u8) -> usize {
    if msg.len() < 776 {
        return 0;
    }

    if handshake_scheme == 0 {
        (((msg[8] as usize) + (msg[9] as usize) + (msg[10] as usize) + (msg[11] as usize)) % 728)
            + 12
    } else {
        (((msg[772] as usize) + (msg[773] as usize) + (msg[774] as usize) + (msg[775] as usize))
            % 728)
            + 776
    }
}

/// Checks the digest embedded in a handshake signature
///
/// # Arguments
///
/// * `signature` - The 1536 byte signature
/// * `handshake_scheme` - Digest scheme (0 or 1)
/// * `key` - HMAC key the digest was computed with
pub fn verify_signature_digest(signature: &[u8], handshake_scheme: u8, key: &[u8]) -> bool {
    if signature.len() != RTMP_SIG_SIZE {
        return false;
    }

    let digest_offset = get_digest_offset(signature, handshake_scheme);

    let mut msg: Vec<u8> = Vec::with_capacity(RTMP_SIG_SIZE - SHA256_DIGEST_LEN);

    msg.extend_from_slice(&signature[..digest_offset]);
    msg.extend_from_slice(&signature[digest_offset + SHA256_DIGEST_LEN..]);

    calc_hmac(&msg, key) == signature[digest_offset..digest_offset + SHA256_DIGEST_LEN]
}

/// Generates the S1 and S2 handshake signatures as a single buffer
///
/// S1 carries the server time, the version bytes {3, 0, 2, 1} and a digest
/// keyed by the first 36 bytes of the FMS key. S2 ends with a signature
/// keyed by the digest of the client's own digest under the full FMS key.
///
/// # Arguments
///
/// * `client_signature` - The 1536 byte client signature (C1)
/// * `logger` - Logger of the connection
///
/// # Return value
///
/// The 3072 bytes of S1 followed by S2
pub fn generate_s1_s2(client_signature: &[u8], logger: &Logger) -> Result<Vec<u8>, ()> {
    if client_signature.len() < RTMP_SIG_SIZE {
        log_error!(
            logger,
            format!(
                "Client signature is too small. Expected at least {}, but found {}",
                RTMP_SIG_SIZE,
                client_signature.len()
            )
        );
        return Err(());
    }

    let handshake_scheme = detect_handshake_scheme(client_signature);

    let mut msg: Vec<u8> = vec![0; 2 * RTMP_SIG_SIZE];

    let time = Utc::now().timestamp_millis() as u32;
    LittleEndian::write_u32(&mut msg[0..4], time);

    msg[4..8].copy_from_slice(&[3, 0, 2, 1]);

    fill_handshake_pattern(
        &mut msg[8..2 * RTMP_SIG_SIZE - 8],
        8,
        (2 * RTMP_SIG_SIZE) as u32,
        StdRng::from_os_rng().random_range(0..(2 * RTMP_SIG_SIZE) as u32),
    );

    // S1 digest, with the 32 digest bytes excised from the hashed data

    let server_digest_offset = get_digest_offset(&msg[..RTMP_SIG_SIZE], handshake_scheme);

    let mut hash_buf: Vec<u8> = Vec::with_capacity(RTMP_SIG_SIZE - SHA256_DIGEST_LEN);

    hash_buf.extend_from_slice(&msg[..server_digest_offset]);
    hash_buf.extend_from_slice(&msg[server_digest_offset + SHA256_DIGEST_LEN..RTMP_SIG_SIZE]);

    let server_digest = calc_hmac(&hash_buf, &GLOB_FMS_KEY[..36]);

    msg[server_digest_offset..server_digest_offset + SHA256_DIGEST_LEN]
        .copy_from_slice(&server_digest);

    // S2 tail signature, keyed by the digest of the client's digest

    let client_digest_offset = get_digest_offset(client_signature, handshake_scheme);

    let hash_key = calc_hmac(
        &client_signature[client_digest_offset..client_digest_offset + SHA256_DIGEST_LEN],
        &GLOB_FMS_KEY,
    );

    let signature = calc_hmac(
        &msg[RTMP_SIG_SIZE..2 * RTMP_SIG_SIZE - SHA256_DIGEST_LEN],
        &hash_key,
    );

    msg[2 * RTMP_SIG_SIZE - SHA256_DIGEST_LEN..].copy_from_slice(&signature);

    Ok(msg)
}

/// Generates the C0 and C1 client handshake bytes as a single buffer
///
/// # Return value
///
/// The version byte followed by the 1536 byte client signature
pub fn generate_c0_c1() -> Vec<u8> {
    let mut msg: Vec<u8> = vec![0; 1 + RTMP_SIG_SIZE];

    msg[0] = RTMP_VERSION;

    let time = Utc::now().timestamp_micros() as u32;
    LittleEndian::write_u32(&mut msg[1..5], time);

    // msg[5..9] stays zeroed

    fill_handshake_pattern(&mut msg[9..], 9, RTMP_SIG_SIZE as u32, 0);

    msg
}

/// Generates the C2 echo of the server signature
///
/// # Arguments
///
/// * `server_signature` - The 1536 byte server signature (S1)
///
/// # Return value
///
/// The 1536 byte C2 message
pub fn generate_c2(server_signature: &[u8]) -> Vec<u8> {
    let mut msg: Vec<u8> = vec![0; RTMP_SIG_SIZE];

    msg[0..4].copy_from_slice(&server_signature[0..4]);

    let time = Utc::now().timestamp_millis() as u32;
    LittleEndian::write_u32(&mut msg[4..8], time);

    msg[8..].copy_from_slice(&server_signature[..RTMP_SIG_SIZE - 8]);

    msg
}

/// Fills a buffer with the handshake filler pattern n = (base + i + n) % 317
///
/// # Arguments
///
/// * `buf` - Buffer to fill
/// * `start_index` - Index of the first buffer byte within the whole message
/// * `base` - Additive base of the pattern
/// * `seed` - Initial value of n
fn fill_handshake_pattern(buf: &mut [u8], start_index: usize, base: u32, seed: u32) {
    let mut n = seed;

    for (i, b) in buf.iter_mut().enumerate() {
        n = (base + (start_index + i) as u32 + n) % 317;
        *b = n as u8;
    }
}

// Tests
