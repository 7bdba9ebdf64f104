/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::path::Path;
use std::fs::File;
use std::io::BufReader;
use memmap2::Mmap;
use flate2::read::GzDecoder;

use crate::arch::Architecture;
#[allow(unused)]
use crate::log::*;


#[derive(Debug, Clone)]
pub enum OpenError {
    CantOpenFile(String),
    ParseError(String),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::CantOpenFile(msg) => write!(f, "can't open file: {}", msg),
            OpenError::ParseError(msg) => write!(f, "malformed architecture records: {}", msg),
        }
    }
}

impl std::error::Error for OpenError {}

#[derive(Default)]
pub struct OpenOpts {
    /* Input is gzip-compressed */
    pub gz: bool,
}

/// Loads architecture records from a YAML (or JSON) document.
pub fn open<P>(path: P, opts: OpenOpts) -> Result<Architecture, OpenError> where
    P: AsRef<Path>
{
    let path = path.as_ref();
    let arch_file = File::open(path)
        .map_err(|e| OpenError::CantOpenFile(format!("{}: {:?}", path.display(), e)))?;

    let arch: Architecture = if opts.gz {
        let d = BufReader::new(GzDecoder::new(arch_file));
        serde_yaml::from_reader(d)
            .map_err(|e| OpenError::ParseError(format!("{}", e)))?
    } else {
        /* UNSAFE DUE TO A POTENTIAL UB WHEN A FILE IS CHANGED! */
        let mmapped = unsafe { Mmap::map(&arch_file) }
            .map_err(|e| OpenError::CantOpenFile(format!("mmap failed: {:?}", e)))?;
        from_slice(&mmapped)?
    };

    dbg_log!(
        DBG_INFO,
        "Loaded {}: {} wire types, {} switchblocks",
        path.display(), arch.wire_types.len(), arch.switchblocks.len()
    );

    Ok(arch)
}

pub fn from_slice(data: &[u8]) -> Result<Architecture, OpenError> {
    serde_yaml::from_slice(data).map_err(|e| OpenError::ParseError(format!("{}", e)))
}
