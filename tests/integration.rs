/// Integration tests for atrsio

use atrsio::pia::{PBCTL, PIA_BASE};
use atrsio::*;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

static IMAGE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// An image file in the temp directory, removed when dropped
struct TempImage {
    path: PathBuf,
}

impl TempImage {
    fn new(name: &str, data: &[u8]) -> Self {
        let n = IMAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "atrsio-test-{}-{}-{}",
            std::process::id(),
            n,
            name
        ));
        std::fs::write(&path, data).expect("Failed to write image");
        TempImage { path }
    }

    fn name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn bytes(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("Failed to read image")
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// ATR image with `data_length` zero bytes after the header
fn atr_image(sector_size: u16, data_length: usize) -> Vec<u8> {
    let mut image = AtrHeader::new(sector_size, data_length as u64)
        .to_bytes()
        .to_vec();
    image.resize(16 + data_length, 0);
    image
}

/// Send a command frame and return the acknowledge byte
fn command(
    session: &mut SioSession,
    store: &mut DiskStore,
    unit: usize,
    code: u8,
    sector: u16,
) -> u8 {
    session.set_command_line(true);
    for byte in CommandFrame::new(unit, code, sector).to_bytes() {
        session.put_byte(store, byte);
    }
    session.set_command_line(false);
    session.get_byte(store)
}

/// Drain whatever the drive still has to send
fn drain(session: &mut SioSession, store: &mut DiskStore) -> Vec<u8> {
    let mut out = Vec::new();
    while matches!(
        session.state(),
        TransferState::ReadFrame | TransferState::FinalStatus
    ) {
        out.push(session.get_byte(store));
    }
    out
}

/// Send a data frame, optionally with a corrupted checksum
fn send_data(
    session: &mut SioSession,
    store: &mut DiskStore,
    data: &[u8],
    corrupt: bool,
) -> Vec<u8> {
    for &byte in data {
        session.put_byte(store, byte);
    }
    let sum = checksum(data);
    session.put_byte(store, if corrupt { sum.wrapping_add(1) } else { sum });
    drain(session, store)
}

#[test]
fn test_mount_single_density_xfd() {
    let image = TempImage::new("sd.xfd", &vec![0u8; 92_160]);
    let mut store = DiskStore::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    assert_eq!(store.status(1), DriveStatus::ReadWrite);
    assert_eq!(store.filename(1), image.name());
    assert!(store.is_mounted(1));

    let geometry = store.geometry(1).expect("geometry");
    assert_eq!(geometry.header_size, 0);
    assert_eq!(geometry.sector_size, 128);
    assert_eq!(geometry.sector_count, 720);
    assert_eq!(geometry.layout, BootSectorLayout::Logical);

    let unit = store.unit(1).expect("unit");
    assert_eq!(unit.image_kind(), Some(ImageKind::Xfd));
    assert_eq!(unit.scratch_path(), None);

    store.dismount(1).expect("Failed to dismount");
    assert_eq!(store.status(1), DriveStatus::NoDisk);
    assert_eq!(store.filename(1), "Empty");
    assert_eq!(store.geometry(1), None);

    // Dismount is idempotent
    store.dismount(1).expect("Failed to dismount");
    assert_eq!(store.status(1), DriveStatus::NoDisk);
}

#[test]
fn test_mount_enhanced_density_xfd() {
    // 1040 x 128 is the largest single density image
    let image = TempImage::new("ed.xfd", &vec![0u8; 133_120]);
    let mut store = DiskStore::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    let geometry = store.geometry(1).expect("geometry");
    assert_eq!(geometry.sector_size, 128);
    assert_eq!(geometry.sector_count, 1040);

    let (reply, status) = store.drive_status(1);
    assert_eq!(reply, DriveReply::Complete);
    assert_eq!(status[0], 0x90);
}

#[test]
fn test_mount_double_density_xfd() {
    let image = TempImage::new("dd.xfd", &vec![0u8; 133_376]);
    let mut store = DiskStore::new();
    store.mount(2, &image.path, false).expect("Failed to mount");

    let geometry = store.geometry(2).expect("geometry");
    assert_eq!(geometry.sector_size, 256);
    assert_eq!(geometry.layout, BootSectorLayout::Physical);
    assert_eq!(geometry.sector_count, 133_376 / 256);

    let logical = TempImage::new("ddl.xfd", &vec![0u8; 3 * 128 + 717 * 256]);
    store.mount(3, &logical.path, false).expect("Failed to mount");
    let geometry = store.geometry(3).expect("geometry");
    assert_eq!(geometry.layout, BootSectorLayout::Logical);
    assert_eq!(geometry.sector_count, 720);
}

#[test]
fn test_mount_double_density_atr_odd_count() {
    // 1437 single density units: three packed boot sectors + 717 x 256
    let image = TempImage::new("ddl.atr", &atr_image(256, 183_936));
    let mut store = DiskStore::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    let geometry = store.geometry(1).expect("geometry");
    assert_eq!(geometry.header_size, 16);
    assert_eq!(geometry.sector_size, 256);
    assert_eq!(geometry.sector_count, 720);
    assert_eq!(geometry.layout, BootSectorLayout::Logical);
    assert_eq!(store.locate(1, 4).offset, 16 + 384);
}

#[test]
fn test_mount_double_density_atr_even_count() {
    let mut data = atr_image(256, 184_320);
    let sio2pc = TempImage::new("sio2pc.atr", &data);

    data[0x190 + 10] = 0x4C;
    let physical = TempImage::new("phys.atr", &data);

    let mut store = DiskStore::new();
    store.mount(1, &sio2pc.path, false).expect("Failed to mount");
    store.mount(2, &physical.path, false).expect("Failed to mount");

    assert_eq!(
        store.geometry(1).expect("geometry").layout,
        BootSectorLayout::Sio2Pc
    );
    let geometry = store.geometry(2).expect("geometry");
    assert_eq!(geometry.layout, BootSectorLayout::Physical);
    assert_eq!(geometry.sector_count, 720);

    // Boot sectors sit in 256-byte slots, data follows all three
    assert_eq!(store.locate(2, 2).offset, 16 + 256);
    assert_eq!(store.locate(2, 2).size, 128);
    assert_eq!(store.locate(2, 5).offset, 16 + 0x300 + 256);
    assert_eq!(store.locate(2, 5).size, 256);
}

#[test]
fn test_mount_failures() {
    let mut store = DiskStore::new();
    let missing = std::env::temp_dir().join("atrsio-test-missing.atr");
    assert!(matches!(
        store.mount(1, &missing, false),
        Err(SioError::Io(_))
    ));
    assert_eq!(store.status(1), DriveStatus::Off);

    let short = TempImage::new("short.atr", &[0x96, 0x02, 0x08]);
    assert!(matches!(
        store.mount(1, &short.path, false),
        Err(SioError::TruncatedHeader { read: 3, .. })
    ));

    let mut data = atr_image(128, 92_160);
    data[4] = 0x00;
    data[5] = 0x02;
    let bad_size = TempImage::new("bad.atr", &data);
    assert!(matches!(
        store.mount(1, &bad_size.path, false),
        Err(SioError::InvalidSectorSize(512))
    ));

    // A failed mount replaces a mounted image with an empty drive
    let good = TempImage::new("good.xfd", &vec![0u8; 92_160]);
    store.mount(1, &good.path, false).expect("Failed to mount");
    assert!(store.mount(1, &bad_size.path, false).is_err());
    assert_eq!(store.status(1), DriveStatus::NoDisk);
    assert_eq!(store.filename(1), "Empty");
}

#[test]
fn test_write_protected_atr() {
    let mut data = atr_image(128, 92_160);
    data[15] = 1;
    let image = TempImage::new("wp.atr", &data);

    let mut store = DiskStore::new();
    store.mount(1, &image.path, false).expect("Failed to mount");
    assert_eq!(store.status(1), DriveStatus::ReadOnly);
    assert_eq!(store.write_sector(1, 1, &[0xAA; 128]), DriveReply::Error);
}

#[test]
fn test_write_sector_replies() {
    let image = TempImage::new("w.xfd", &vec![0u8; 92_160]);
    let mut store = DiskStore::new();

    // Off: no reply at all
    assert_eq!(store.write_sector(1, 4, &[0xAA; 128]), DriveReply::Silent);

    // Switched on without media
    store.enable(1).expect("enable");
    assert_eq!(store.write_sector(1, 4, &[0xAA; 128]), DriveReply::Nak);

    store.mount(1, &image.path, true).expect("Failed to mount");
    assert_eq!(store.status(1), DriveStatus::ReadOnly);
    assert_eq!(store.write_sector(1, 4, &[0xAA; 128]), DriveReply::Error);
    assert_eq!(store.last_io(1), IoOutcome::Failed);

    store.mount(1, &image.path, false).expect("Failed to mount");
    assert_eq!(store.write_sector(1, 0, &[0xAA; 128]), DriveReply::Error);
    assert_eq!(store.write_sector(1, 721, &[0xAA; 128]), DriveReply::Error);
    assert_eq!(store.write_sector(1, 4, &[0xAA; 128]), DriveReply::Complete);
    assert_eq!(store.last_io(1), IoOutcome::Succeeded);

    let bytes = image.bytes();
    assert!(bytes[384..512].iter().all(|&b| b == 0xAA));
    assert!(bytes[..384].iter().all(|&b| b == 0));
    assert!(bytes[512..].iter().all(|&b| b == 0));
}

#[test]
fn test_write_sector_over_bus() {
    let image = TempImage::new("bus.atr", &atr_image(256, 184_320));
    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    assert_eq!(command(&mut session, &mut store, 1, 0x57, 10), b'A');
    assert_eq!(session.state(), TransferState::WriteFrame);
    assert_eq!(session.remaining_bytes(), 257);

    let payload: Vec<u8> = (0..=255).collect();
    assert_eq!(send_data(&mut session, &mut store, &payload, false), b"AC");
    assert_eq!(session.state(), TransferState::Idle);

    // Sio2Pc layout: three 256-byte boot slots
    let offset = 16 + 0x300 + 6 * 256;
    assert_eq!(&image.bytes()[offset..offset + 256], payload.as_slice());
}

#[test]
fn test_write_replies_over_bus() {
    let image = TempImage::new("ro.xfd", &vec![0u8; 92_160]);
    let mut store = DiskStore::new();
    let mut session = SioSession::new();

    // Off: the drive never answers
    assert_eq!(command(&mut session, &mut store, 1, 0x57, 1), 0);
    assert_eq!(session.state(), TransferState::Idle);

    store.enable(1).expect("enable");
    assert_eq!(command(&mut session, &mut store, 1, 0x57, 1), b'A');
    assert_eq!(send_data(&mut session, &mut store, &[0x11; 128], false), b"AN");

    store.mount(1, &image.path, true).expect("Failed to mount");
    assert_eq!(command(&mut session, &mut store, 1, 0x57, 1), b'A');
    assert_eq!(send_data(&mut session, &mut store, &[0x11; 128], false), b"AE");
    assert!(image.bytes().iter().all(|&b| b == 0));
}

#[test]
fn test_bad_data_checksum_is_not_written() {
    let image = TempImage::new("cs.xfd", &vec![0u8; 92_160]);
    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    assert_eq!(command(&mut session, &mut store, 1, 0x50, 1), b'A');
    assert_eq!(send_data(&mut session, &mut store, &[0x55; 128], true), b"E");
    assert_eq!(session.state(), TransferState::Idle);
    assert!(image.bytes().iter().all(|&b| b == 0));
}

#[test]
fn test_read_sector_over_bus() {
    let mut data = vec![0u8; 92_160];
    for (i, byte) in data[..128].iter_mut().enumerate() {
        *byte = i as u8;
    }
    let image = TempImage::new("r.xfd", &data);
    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.mount(1, &image.path, true).expect("Failed to mount");

    assert_eq!(command(&mut session, &mut store, 1, 0x52, 1), b'A');
    assert_eq!(session.delays().serial_in, Some(32));

    let frame = drain(&mut session, &mut store);
    assert_eq!(frame.len(), 130);
    assert_eq!(frame[0], b'C');
    assert_eq!(&frame[1..129], &data[..128]);
    assert_eq!(frame[129], checksum(&data[..128]));
    assert_eq!(session.delays().serial_in, None);

    // Status after a successful read of a read-only disk
    assert_eq!(command(&mut session, &mut store, 1, 0x53, 0), b'A');
    let status = drain(&mut session, &mut store);
    assert_eq!(status, vec![b'C', 0x18, 0xFF, 0x01, 0x00, checksum(&[0x18, 0xFF, 1, 0])]);

    // Out of range sectors fail and are reported by the next status
    assert_eq!(command(&mut session, &mut store, 1, 0x52, 721), b'A');
    assert_eq!(drain(&mut session, &mut store)[0], b'E');
    assert_eq!(store.last_io(1), IoOutcome::Failed);
    assert_eq!(command(&mut session, &mut store, 1, 0x53, 0), b'A');
    assert_eq!(drain(&mut session, &mut store)[1], 0x1C);
}

#[test]
fn test_percom_over_bus() {
    let image = TempImage::new("pc.xfd", &vec![0u8; 92_160]);
    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    assert_eq!(command(&mut session, &mut store, 1, 0x4E, 0), b'A');
    let frame = drain(&mut session, &mut store);
    assert_eq!(frame[0], b'C');
    assert_eq!(&frame[1..13], &[40, 1, 0, 18, 0, 0, 0, 128, 1, 192, 0, 0]);
    assert_eq!(frame[13], checksum(&frame[1..13]));
}

#[test]
fn test_format_atr_over_bus() {
    let mut data = atr_image(128, 92_160);
    data[16..].fill(0xE5);
    let image = TempImage::new("fmt.atr", &data);
    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.mount(1, &image.path, false).expect("Failed to mount");

    // Ask for double density first
    assert_eq!(command(&mut session, &mut store, 1, 0x4F, 0), b'A');
    assert_eq!(send_data(&mut session, &mut store, &percom_block(256, 720), false), b"AC");
    assert_eq!(store.geometry(1).expect("geometry").sector_size, 128);

    assert_eq!(command(&mut session, &mut store, 1, 0x21, 0), b'A');
    assert_eq!(session.delays().serial_in, Some(64));
    let frame = drain(&mut session, &mut store);
    assert_eq!(frame.len(), 258);
    assert_eq!(frame[0], b'C');
    assert!(frame[1..257].iter().all(|&b| b == 0xFF));

    let geometry = store.geometry(1).expect("geometry");
    assert_eq!(geometry.sector_size, 256);
    assert_eq!(geometry.sector_count, 720);
    assert_eq!(geometry.layout, BootSectorLayout::Logical);
    assert_eq!(store.status(1), DriveStatus::ReadWrite);

    let bytes = image.bytes();
    assert_eq!(bytes.len(), 16 + 3 * 128 + 717 * 256);
    assert_eq!(&bytes[..2], &[0x96, 0x02]);
    assert!(bytes[16..].iter().all(|&b| b == 0));
}

#[test]
fn test_format_read_only_is_refused() {
    let image = TempImage::new("fro.xfd", &vec![0u8; 92_160]);
    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.mount(1, &image.path, true).expect("Failed to mount");

    assert_eq!(command(&mut session, &mut store, 1, 0x22, 0), b'A');
    assert_eq!(drain(&mut session, &mut store)[0], b'E');
    assert_eq!(image.bytes().len(), 92_160);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_path_is_refused() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let n = IMAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("atrsio-test-{}-{}-dir", std::process::id(), n));
    std::fs::create_dir_all(&dir).expect("Failed to create directory");
    let path = dir.join(OsStr::from_bytes(b"disk\xff.xfd"));
    std::fs::write(&path, vec![0xE5u8; 92_160]).expect("Failed to write image");

    let mut store = DiskStore::new();
    let mut session = SioSession::new();
    store.enable(1).expect("Failed to enable");
    match store.mount(1, &path, false) {
        Err(SioError::InvalidPath(rejected)) => assert_eq!(rejected, path),
        other => panic!("expected an invalid path, got {:?}", other),
    }
    assert_eq!(store.status(1), DriveStatus::NoDisk);
    assert!(!store.is_mounted(1));

    // Nothing to format, and no file appears under a substitute name
    assert_eq!(command(&mut session, &mut store, 1, 0x21, 0), b'A');
    assert_eq!(drain(&mut session, &mut store)[0], b'N');
    let entries = std::fs::read_dir(&dir)
        .expect("Failed to list directory")
        .count();
    assert_eq!(entries, 1);
    let bytes = std::fs::read(&path).expect("Failed to read image");
    assert!(bytes.iter().all(|&b| b == 0xE5));

    let _ = std::fs::remove_dir_all(&dir);
}

/// Stands in for real decoders: expands every archive to a fixed image
struct FixedImage {
    image: Vec<u8>,
}

impl Decompressor for FixedImage {
    fn expand_dcm(&mut self, source: &mut dyn Read, target: &mut dyn Write) -> Result<()> {
        let mut archive = Vec::new();
        source.read_to_end(&mut archive)?;
        if archive.first() != Some(&0xFA) {
            return Err(SioError::decompression("not a DCM archive"));
        }
        target.write_all(&self.image)?;
        Ok(())
    }

    fn expand_gzip(&mut self, path: &Path, target: &mut dyn Write) -> Result<()> {
        if !path.exists() {
            return Err(SioError::decompression("missing archive"));
        }
        target.write_all(&self.image)?;
        Ok(())
    }
}

#[test]
fn test_gzip_image_uses_scratch_file() {
    let mut archive = vec![0x1F, 0x8B, 0x08];
    archive.resize(32, 0);
    let gz = TempImage::new("game.atz", &archive);

    let mut store = DiskStore::new().with_decompressor(FixedImage {
        image: atr_image(128, 92_160),
    });
    store.mount(1, &gz.path, false).expect("Failed to mount");

    assert_eq!(store.status(1), DriveStatus::ReadOnly);
    assert_eq!(store.filename(1), gz.name());
    let unit = store.unit(1).expect("unit");
    assert_eq!(unit.image_kind(), Some(ImageKind::Gzip));
    let geometry = unit.geometry().expect("geometry");
    assert_eq!(geometry.header_size, 16);
    assert_eq!(geometry.sector_count, 720);

    let scratch = unit.scratch_path().expect("scratch file").to_path_buf();
    assert!(scratch.exists());

    assert_eq!(store.write_sector(1, 1, &[0; 128]), DriveReply::Error);
    let mut buf = [0xAAu8; 128];
    assert_eq!(store.read_sector(1, 1, &mut buf), DriveReply::Complete);
    assert_eq!(buf, [0u8; 128]);

    store.dismount(1).expect("Failed to dismount");
    assert!(!scratch.exists());
    // The archive itself is untouched
    assert_eq!(gz.bytes(), archive);
}

#[test]
fn test_dcm_image_is_expanded() {
    let mut archive = vec![0xFA, 0x01];
    archive.resize(64, 0);
    let dcm = TempImage::new("game.dcm", &archive);

    let mut store = DiskStore::new().with_decompressor(FixedImage {
        image: vec![0u8; 92_160],
    });
    store.mount(1, &dcm.path, false).expect("Failed to mount");
    assert_eq!(store.status(1), DriveStatus::ReadOnly);
    assert_eq!(store.geometry(1).expect("geometry").header_size, 0);
    store.dismount_all();
    assert_eq!(store.status(1), DriveStatus::NoDisk);
}

#[test]
fn test_compressed_image_without_decompressor() {
    let mut archive = vec![0x1F, 0x8B];
    archive.resize(32, 0);
    let gz = TempImage::new("plain.atz", &archive);

    let mut store = DiskStore::new();
    assert!(matches!(
        store.mount(1, &gz.path, false),
        Err(SioError::UnsupportedFormat(_))
    ));
    assert!(!store.is_mounted(1));
}

#[test]
fn test_save_and_restore_state() {
    let image = TempImage::new("d1.atr", &atr_image(128, 92_160));
    let mut store = DiskStore::new();
    store.mount(1, &image.path, false).expect("Failed to mount");
    store.enable(2).expect("enable");

    let mut saved = Vec::new();
    save_state(&store, &mut saved).expect("Failed to save state");
    drop(store);

    let mut restored = DiskStore::new();
    restore_state(&mut restored, &mut saved.as_slice()).expect("Failed to restore state");
    assert_eq!(restored.status(1), DriveStatus::ReadWrite);
    assert_eq!(restored.filename(1), image.name());
    assert_eq!(restored.geometry(1).expect("geometry").sector_count, 720);
    assert_eq!(restored.status(2), DriveStatus::NoDisk);
    assert_eq!(restored.status(3), DriveStatus::Off);
    restored.dismount_all();

    // Once the file is gone the unit comes back empty
    drop(image);
    let mut restored = DiskStore::new();
    restore_state(&mut restored, &mut saved.as_slice()).expect("Failed to restore state");
    assert_eq!(restored.status(1), DriveStatus::NoDisk);
    assert_eq!(restored.filename(1), "Empty");
    assert_eq!(restored.status(2), DriveStatus::NoDisk);
}

#[test]
fn test_sio_port_drives_protocol() {
    let image = TempImage::new("port.xfd", &vec![0x42u8; 92_160]);
    let mut drives = DiskStore::new();
    drives.mount(1, &image.path, false).expect("Failed to mount");
    let mut port = SioPort::new(drives);

    // Command line low through PBCTL bit 3
    port.put_byte(PIA_BASE + PBCTL, 0x34);
    for byte in CommandFrame::new(1, 0x52, 720).to_bytes() {
        let delays = port.serial_out(byte);
        assert_eq!(delays.serial_out, Some(8));
    }
    assert_eq!(port.session().delays().serial_in, Some(44));
    port.put_byte(PIA_BASE + PBCTL, 0x3C);

    assert_eq!(port.serial_in(), b'A');
    assert_eq!(port.serial_in(), b'C');
    let sector: Vec<u8> = (0..128).map(|_| port.serial_in()).collect();
    assert!(sector.iter().all(|&b| b == 0x42));
    assert_eq!(port.serial_in(), checksum(&sector));
    assert_eq!(port.session().state(), TransferState::Idle);

    port.drives_mut().dismount_all();
}

#[test]
fn test_io_map_routes_to_port() {
    let mut map = IoMap::new();
    map.map(0xD300..=0xD3FF, Box::new(SioPort::new(DiskStore::new())));
    assert_eq!(map.get_byte(PIA_BASE + PBCTL), 0x3F);
    map.put_byte(PIA_BASE + PBCTL, 0x34);
    assert_eq!(map.get_byte(0xD303), 0x34);
    assert_eq!(map.get_byte(0xD400), 0xFF);
}

#[test]
fn test_binary_loading_redirects_sectors() {
    let mut data = vec![0u8; 92_160];
    data[..128].fill(0x99);
    let image = TempImage::new("bin.xfd", &data);
    let mut store = DiskStore::new();
    store.mount(1, &image.path, true).expect("Failed to mount");

    store.set_binary_loading(true);
    let mut buf = [0u8; 128];
    assert_eq!(store.read_sector(1, 500, &mut buf), DriveReply::Complete);
    assert_eq!(buf, [0x99; 128]);
    store.set_binary_loading(false);

    assert_eq!(store.read_sector(1, 500, &mut buf), DriveReply::Complete);
    assert_eq!(buf, [0u8; 128]);
}
