#![no_main]

use libfuzzer_sys::fuzz_target;
use xs2a_wizard::decoder::Decoder;

fuzz_target!(|data: &[u8]| {
    let _ = Decoder::default().classify_slice(data);
});
