#![no_main]

use frame_reactor::core::varint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match varint::decode(data) {
        Ok(Some((value, read))) => {
            assert!(read >= 1 && read <= varint::MAX_VARINT_LEN);
            let mut encoded = Vec::new();
            varint::encode(value, &mut encoded);
            assert!(encoded.len() <= read);
        }
        Ok(None) => assert!(data.len() < varint::MAX_VARINT_LEN),
        Err(_) => assert!(data.len() >= varint::MAX_VARINT_LEN),
    }
});
