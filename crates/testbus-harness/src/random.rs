//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Random payload generators for test bodies."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use bytes::Bytes;
use rand::Rng;

/// `len` uniformly random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    bytes
}

/// `len` random bytes, none equal to `avoid`. Handy for building delimited
/// lines whose bodies must not contain the delimiter.
pub fn random_bytes_avoiding(len: usize, avoid: u8) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| loop {
            let byte: u8 = rng.gen();
            if byte != avoid {
                break byte;
            }
        })
        .collect()
}

pub fn random_buffer(len: usize) -> Bytes {
    Bytes::from(random_bytes(len))
}

pub fn random_buffer_avoiding(len: usize, avoid: u8) -> Bytes {
    Bytes::from(random_bytes_avoiding(len, avoid))
}

/// `len` characters from the basic multilingual plane, excluding surrogates
/// and the non-characters U+FFFE and U+FFFF.
pub fn random_unicode_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| loop {
            if let Some(c) = char::from_u32(rng.gen_range(0..0xFFFE)) {
                break c;
            }
        })
        .collect()
}

/// `len` uppercase ASCII letters.
pub fn random_alpha_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect()
}
