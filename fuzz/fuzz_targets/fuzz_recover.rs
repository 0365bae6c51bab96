//! Recovery must reject or recover arbitrary files without panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct RecoverInput {
    width: u8,
    height: u8,
    out_len: u16,
    data: Vec<u8>,
}

fuzz_target!(|input: RecoverInput| {
    // Most random inputs fail the signature check; give the walker a head start.
    let mut file = pngtail::png::PNG_SIGNATURE.to_vec();
    file.extend_from_slice(&input.data);

    let mut out = vec![0u8; input.out_len as usize];
    let status = pngtail::recover_status(
        &file,
        input.width as u32,
        input.height as u32,
        &mut out,
    );
    assert!(status >= -9);
    if status >= 0 {
        assert!(status as usize <= out.len());
        assert_eq!(&out[..8], &pngtail::png::PNG_SIGNATURE);
    }
});
