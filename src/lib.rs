/*!
Compact binary delta patches for firmware-style updates.

A patch encodes a target buffer as differences against a source buffer,
found through a suffix array of the source. Patches apply either as a
stream producing the target, or in place: split into segments that rewrite
the storage region holding the source image itself.

Create and apply a patch:
```
use bindelta::{apply_patch, create_patch};

let source = b"helle olb world";
let target = b"hello old world, again";
let patch = create_patch(source, target).unwrap();
assert_eq!(apply_patch(source, &patch).unwrap(), target.to_vec());
```

Update an image inside its own storage region:
```
use bindelta::{apply_in_place_patch, create_in_place_patch};

let source = b"version 1 firmware image";
let target = b"version 2 firmware image, patched";
let patch = create_in_place_patch(source, target, 64, 8, None).unwrap();

let mut memory = source.to_vec();
memory.resize(64, 0xff);
apply_in_place_patch(&mut memory, &patch).unwrap();
assert_eq!(&memory[..target.len()], &target[..]);
```
*/

pub mod apply;
pub mod compress;
pub mod create;
pub mod error;
pub mod info;
pub mod inplace;
pub mod sais;
pub mod varint;

mod diff;
mod format;

pub use apply::{apply_patch, Patch};
pub use compress::Compression;
pub use create::{create_patch, Delta};
pub use error::{Error, Result};
pub use format::PatchType;
pub use info::{patch_info, PatchInfo};
pub use inplace::{apply_in_place_patch, create_in_place_patch, InPlaceDelta};
