//! Crate-level round-trip coverage: write a fresh MSF file with `write_msf`,
//! then read it back through [`msf::Archive`]. Mirrors how the rest of this
//! lineage splits unit tests (inside `src/`) from integration tests that
//! exercise the public API end to end.

use msf::{Archive, MsfError};
use std::sync::Mutex;
use sync_file::{ReadAt, WriteAt};

#[static_init::dynamic]
static INIT_LOGGER: () = {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_test_writer()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(tracing::Level::DEBUG)
        .compact()
        .without_time()
        .init();
};

#[derive(Default)]
struct MemFile(Mutex<Vec<u8>>);

impl ReadAt for MemFile {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        let data = self.0.lock().unwrap();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        let data = self.0.lock().unwrap();
        let start = offset as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let end = (start + buf.len()).min(data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&data[start..end]);
        Ok(n)
    }
}

impl WriteAt for MemFile {
    fn write_all_at(&self, buf: &[u8], offset: u64) -> std::io::Result<()> {
        let mut data = self.0.lock().unwrap();
        let start = offset as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }
    fn write_at(&self, buf: &[u8], offset: u64) -> std::io::Result<usize> {
        self.write_all_at(buf, offset)?;
        Ok(buf.len())
    }
}

fn extract_all(archive: &Archive<MemFile>) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut prev = None;
    loop {
        match archive.next_after(prev) {
            Ok(s) => {
                out.push(s.data().to_vec());
                prev = Some(s.index());
            }
            Err(MsfError::NoMoreFiles) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    out
}

#[test]
fn round_trip_preserves_every_payload_byte_for_byte() {
    let file = MemFile::default();
    let payloads: Vec<Vec<u8>> = vec![
        b"symbol record stream".to_vec(),
        Vec::new(),
        (0..4096u32).map(|i| (i % 256) as u8).collect(),
        b"type record stream".to_vec(),
    ];
    msf::write_msf(&file, &payloads).unwrap();

    let archive = Archive::probe(file).unwrap();
    assert_eq!(archive.num_streams().unwrap(), payloads.len() as u32);
    assert_eq!(extract_all(&archive), payloads);
}

#[test]
fn probing_a_non_msf_file_reports_wrong_format() {
    let file = MemFile(Mutex::new(b"just some random bytes, not an MSF file".to_vec()));
    let err = Archive::probe(file).unwrap_err();
    assert!(matches!(err, MsfError::WrongFormat));
}

#[test]
fn probing_a_truncated_header_reports_wrong_format_not_a_panic() {
    let file = MemFile(Mutex::new(vec![0u8; 10]));
    let err = Archive::probe(file).unwrap_err();
    assert!(matches!(err, MsfError::WrongFormat));
}

#[test]
fn writer_refuses_a_layout_the_block_map_page_cannot_address() {
    // Each stream below needs exactly one directory-block-pointer's worth
    // of data blocks; past 256 of them (for the default 1024-byte write
    // block size) the block-map page, which holds only 256 u32 entries,
    // cannot name another directory block.
    let payload = vec![0u8; 1024 * 300];
    let payloads: Vec<&[u8]> = vec![payload.as_slice(); 300];
    let file = MemFile::default();
    let err = msf::write_msf(&file, &payloads).unwrap_err();
    assert!(matches!(err, MsfError::InvalidOperation(_)));
}

#[test]
fn enumeration_order_matches_write_order() {
    let file = MemFile::default();
    let payloads: Vec<&[u8]> = vec![b"first", b"second", b"third"];
    msf::write_msf(&file, &payloads).unwrap();

    let archive = Archive::probe(file).unwrap();
    let names: Vec<String> = {
        let mut names = Vec::new();
        let mut prev = None;
        loop {
            match archive.next_after(prev) {
                Ok(s) => {
                    names.push(s.name());
                    prev = Some(s.index());
                }
                Err(MsfError::NoMoreFiles) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        names
    };
    assert_eq!(names, vec!["0000", "0001", "0002"]);
}
