/*!
# atrsio

A Rust library emulating Atari 8-bit disk drives on the SIO serial bus.

## Features

- Mount ATR and XFD disk images on drive units D1: to D8:
- DCM and gzip images through a pluggable decompressor, mounted read-only
- Single, enhanced and double density geometry with all three boot sector layouts
- Byte-at-a-time SIO protocol: read, write, status, PERCOM and format commands
- Save and restore of the mount state of all drives

## Quick Start

```rust,no_run
use atrsio::{CommandFrame, DiskStore, SioSession};

let mut drives = DiskStore::new();
drives.mount(1, "dos.atr", false)?;

// Read sector 1 of D1: over the bus
let mut session = SioSession::new();
session.set_command_line(true);
for byte in CommandFrame::new(1, 0x52, 1).to_bytes() {
    session.put_byte(&mut drives, byte);
}
session.set_command_line(false);

let ack = session.get_byte(&mut drives);
let complete = session.get_byte(&mut drives);
let sector: Vec<u8> = (0..128).map(|_| session.get_byte(&mut drives)).collect();
let checksum = session.get_byte(&mut drives);
# Ok::<(), atrsio::SioError>(())
```

## Modules

- `format`: image format detection, ATR header and constants
- `image`: drive units, geometry and the disk store
- `io`: image files, scratch files and decompression
- `sio`: the serial bus protocol
- `status`: drive replies and status flags
- `state`: saving and restoring drive state
- `pia`, `bus`: the PIA command line and memory-mapped I/O
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Memory-mapped I/O and the serial port
pub mod bus;
/// Error types and Result alias
pub mod error;
/// Image format detection, ATR header and constants
pub mod format;
/// Drive units, geometry and the disk store
pub mod image;
/// Image files, scratch files and decompression
pub mod io;
/// PIA port controller
pub mod pia;
/// Serial bus protocol
pub mod sio;
/// Saving and restoring drive state
pub mod state;
/// Drive replies and status flags
pub mod status;

// Re-export common types
pub use bus::{IoMap, Peripheral, SioPort};
pub use error::{Result, SioError};
pub use format::{detect_format, AtrHeader, ImageKind};
pub use image::{
    percom_block, BootSectorLayout, DiskStore, DriveStatus, DriveUnit, FormatGeometry, Geometry,
    IoOutcome, SectorLocation,
};
pub use io::{Decompressor, NoDecompressor};
pub use pia::Pia;
pub use sio::{checksum, BusDelays, CommandFrame, DiskCommand, SioSession, SioTiming, TransferState};
pub use state::{restore_state, save_state};
pub use status::{DriveReply, DriveStatusFlags};
