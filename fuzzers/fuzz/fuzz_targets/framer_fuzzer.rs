#![no_main]
use libfuzzer_sys::fuzz_target;
use packstream::{FramerConfig, MalformedPolicy, MsgPackCodec, StreamFramer, Value};

// The first byte picks the chunk size so split points vary with the input.
fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let config = FramerConfig::default().with_malformed_policy(MalformedPolicy::Clear);
    let mut framer = StreamFramer::with_config(std::io::empty(), MsgPackCodec::new(), config);
    let mut values: Vec<Value> = Vec::new();
    for chunk in rest.chunks(usize::from(split).max(1)) {
        let _ = framer.feed(chunk.to_vec(), &mut values);
    }
});
