#![no_main]

use bytes::BytesMut;
use frame_reactor::utils::compression::{compress, Inflater};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut inflater = Inflater::new();
    let mut out = BytesMut::new();

    // Valid streams must inflate back exactly
    if let Ok(compressed) = compress(data) {
        inflater
            .inflate_into(&compressed, &mut out, data.len())
            .expect("own output must inflate");
        assert_eq!(&out[..], data);
    }

    // Arbitrary bytes with an arbitrary declared size must fail cleanly
    let declared = data.first().map_or(0, |b| *b as usize * 64);
    if inflater.inflate_into(data, &mut out, declared).is_ok() {
        assert_eq!(out.len(), declared);
    }
});
