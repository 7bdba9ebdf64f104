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

use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::collections::BTreeMap;

use flate2::{Compression, write::GzEncoder};
use serde::Serialize;

pub trait Exporter {
    fn export<D>(&mut self, name: &str, data: &D) -> std::io::Result<()>
    where
        D: Serialize + ?Sized;

    fn flush(&mut self) -> std::io::Result<()>;
}

/// Gathers named documents and writes them as a single JSON object on flush.
/// Output is gzip-compressed when the file name ends with `.gz`.
pub struct CompoundJsonExporter {
    filename: PathBuf,
    data: BTreeMap<String, serde_json::Value>,
}

impl CompoundJsonExporter {
    pub fn new<P>(filename: P) -> Self where P: AsRef<Path> {
        Self { filename: filename.as_ref().to_path_buf(), data: BTreeMap::new() }
    }

    fn compressed(&self) -> bool {
        self.filename.extension().map_or(false, |ext| ext == "gz")
    }

    pub fn write_to<W>(&self, writer: W) -> std::io::Result<()> where W: Write {
        serde_json::to_writer_pretty(writer, &self.data)?;
        Ok(())
    }
}

impl Exporter for CompoundJsonExporter {
    fn export<D>(&mut self, name: &str, data: &D) -> std::io::Result<()>
    where
        D: Serialize + ?Sized
    {
        let value = serde_json::to_value(data)?;
        self.data.insert(name.into(), value);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let file = BufWriter::new(File::create(&self.filename)?);
        if self.compressed() {
            let mut encoder = GzEncoder::new(file, Compression::default());
            self.write_to(&mut encoder)?;
            encoder.finish()?.flush()
        } else {
            let mut file = file;
            self.write_to(&mut file)?;
            file.flush()
        }
    }
}
