#![no_main]

use bytes::BytesMut;
use frame_reactor::core::frame::{reassemble, FrameLimits};
use frame_reactor::utils::compression::Inflater;
use libfuzzer_sys::fuzz_target;

const MAX_PACKET: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let Some((&mode, input)) = data.split_first() else {
        return;
    };
    let limits = FrameLimits {
        max_packet_size: MAX_PACKET,
        compressed: mode & 1 == 1,
    };
    let mut inflater = Inflater::new();
    let mut content = BytesMut::new();

    let result = reassemble(input, limits, &mut inflater, &mut content, |frame| {
        assert!(frame.len() <= MAX_PACKET);
        Ok(())
    });
    if let Ok(outcome) = result {
        assert!(outcome.consumed <= input.len());
    }
    assert!(content.is_empty());
});
