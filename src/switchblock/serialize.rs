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

use serde::{Serialize, Serializer, ser::{SerializeMap, SerializeStruct}};

use super::*;

impl Serialize for ToTrack {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where
        S: Serializer
    {
        let mut s = serializer.serialize_struct("ToTrack", 2)?;
        s.serialize_field("to_track", &self.to_track)?;
        s.serialize_field("switch_name", &self.switch_name)?;
        s.end()
    }
}

/* Keys are flattened to "x,y,from,to,track" strings, since JSON objects can
 * only be keyed by strings. */
impl Serialize for ConnectionMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where
        S: Serializer
    {
        let mut m = serializer.serialize_map(Some(self.len()))?;
        for (key, tos) in self.iter() {
            m.serialize_entry(&key.to_string(), tos)?;
        }
        m.end()
    }
}

/// A connection map along with the device it was built for.
pub struct ConnectionMapWithExtras<'m> {
    device: DeviceInfo,
    directionality: Directionality,
    stamp_period: Option<usize>,
    map: &'m ConnectionMap,
}

impl ConnectionMap {
    pub fn with_extras<'m>(&'m self, ctx: &BuildContext, stamp_period: Option<usize>)
        -> ConnectionMapWithExtras<'m>
    {
        ConnectionMapWithExtras {
            device: ctx.device,
            directionality: ctx.directionality,
            stamp_period,
            map: self,
        }
    }
}

impl<'m> Serialize for ConnectionMapWithExtras<'m> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where
        S: Serializer
    {
        let mut s = serializer.serialize_struct("SwitchblockConnections", 5)?;
        s.serialize_field("device", &self.device)?;
        s.serialize_field("directionality", &self.directionality)?;
        s.serialize_field("stamp_period", &self.stamp_period)?;
        s.serialize_field("connection_count", &self.map.connection_count())?;
        s.serialize_field("connections", self.map)?;
        s.end()
    }
}
