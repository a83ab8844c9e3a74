use std::fs;
use std::io::{self, Write};
use std::process::Command;

use tempdir::TempDir;

/// Assembles 8086 assembly text with the external `nasm` binary and returns
/// the flat binary image. Used by the round-trip tests to verify that
/// disassembly output re-assembles to the original bytes.
pub fn assemble(asm: &str) -> Result<Vec<u8>, io::Error> {
    let tmp_dir = TempDir::new("emu86")?;
    let asm_path = tmp_dir.path().join("input.asm");
    let bin_path = tmp_dir.path().join("output.bin");

    let mut asm_file = fs::File::create(&asm_path)?;
    asm_file.write_all(asm.as_bytes())?;
    asm_file.write_all(b"\n")?;
    drop(asm_file);

    let output = Command::new("nasm")
        .arg("-f")
        .arg("bin")
        .arg(&asm_path)
        .arg("-o")
        .arg(&bin_path)
        .output()?;
    if !output.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    let data = fs::read(&bin_path)?;
    tmp_dir.close()?;
    Ok(data)
}
