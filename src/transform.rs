// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Transform snapshots shared between a simulation thread and the render thread without locks.
//!
//! The writer (usually the physics thread) publishes position and rotation, the render thread
//! reads a consistent copy of both each time it needs a world matrix. Components are stored as
//! raw `f32` bits in atomics behind a sequence counter: the counter is odd while a write is in
//! progress, and a reader retries until it sees the same even value before and after reading.

use std::sync::atomic::{self, AtomicU32, Ordering};
use umbra_core::algebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformSnapshot {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for TransformSnapshot {
    fn default() -> Self {
        Self {
            position: Vector3::default(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl TransformSnapshot {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.position) * self.rotation.to_homogeneous()
    }
}

const COMPONENT_COUNT: usize = 7;

/// Seqlock protected position + rotation.
#[derive(Debug)]
pub struct SharedTransform {
    sequence: AtomicU32,
    // x, y, z, then quaternion i, j, k, w.
    components: [AtomicU32; COMPONENT_COUNT],
}

impl Default for SharedTransform {
    fn default() -> Self {
        Self::new(TransformSnapshot::default())
    }
}

fn to_components(snapshot: &TransformSnapshot) -> [f32; COMPONENT_COUNT] {
    let q = snapshot.rotation.quaternion();
    [
        snapshot.position.x,
        snapshot.position.y,
        snapshot.position.z,
        q.i,
        q.j,
        q.k,
        q.w,
    ]
}

impl SharedTransform {
    pub fn new(snapshot: TransformSnapshot) -> Self {
        Self {
            sequence: AtomicU32::new(0),
            components: to_components(&snapshot).map(|c| AtomicU32::new(c.to_bits())),
        }
    }

    /// Publishes a new snapshot. Concurrent writers are serialized on the sequence counter.
    pub fn store(&self, snapshot: TransformSnapshot) {
        let mut sequence = self.sequence.load(Ordering::Relaxed);
        loop {
            if sequence % 2 == 1 {
                std::hint::spin_loop();
                sequence = self.sequence.load(Ordering::Relaxed);
                continue;
            }
            match self.sequence.compare_exchange_weak(
                sequence,
                sequence.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => sequence = actual,
            }
        }
        atomic::fence(Ordering::Release);

        for (slot, value) in self.components.iter().zip(to_components(&snapshot)) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }

        self.sequence
            .store(sequence.wrapping_add(2), Ordering::Release);
    }

    pub fn set_position(&self, position: Vector3<f32>) {
        let mut snapshot = self.load();
        snapshot.position = position;
        self.store(snapshot);
    }

    /// Reads a consistent snapshot, never a mix of two writes.
    pub fn load(&self) -> TransformSnapshot {
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let c = self
                .components
                .each_ref()
                .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)));

            atomic::fence(Ordering::Acquire);
            if self.sequence.load(Ordering::Relaxed) == before {
                return TransformSnapshot {
                    position: Vector3::new(c[0], c[1], c[2]),
                    rotation: UnitQuaternion::new_unchecked(Quaternion::new(c[6], c[3], c[4], c[5])),
                };
            }
        }
    }

    /// Amount of completed writes.
    pub fn version(&self) -> u32 {
        self.sequence.load(Ordering::Acquire) / 2
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.load().matrix()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_store_load() {
        let transform = SharedTransform::default();
        assert_eq!(transform.load(), TransformSnapshot::default());

        let snapshot = TransformSnapshot::new(
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.5),
        );
        transform.store(snapshot);
        assert_eq!(transform.load(), snapshot);
        assert_eq!(transform.version(), 1);

        transform.set_position(Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(transform.load().position, Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(transform.load().rotation, snapshot.rotation);
        assert_eq!(transform.matrix()[12], 4.0);
    }

    #[test]
    fn test_readers_never_see_torn_values() {
        let transform = Arc::new(SharedTransform::default());

        let writer = {
            let transform = transform.clone();
            thread::spawn(move || {
                for i in 0..20_000 {
                    // Every component of a single write carries the same value.
                    let v = i as f32;
                    transform.store(TransformSnapshot::new(
                        Vector3::new(v, v, v),
                        UnitQuaternion::new_unchecked(Quaternion::new(v, v, v, v)),
                    ));
                }
            })
        };

        for _ in 0..20_000 {
            let snapshot = transform.load();
            let v = snapshot.position.x;
            assert_eq!(snapshot.position, Vector3::new(v, v, v));
            let q = snapshot.rotation.quaternion();
            // Default rotation is the identity, every later write is uniform.
            assert!((q.i == q.j && q.j == q.k && q.k == q.w) || (q.w == 1.0 && v == 0.0));
        }

        writer.join().unwrap();
        assert_eq!(transform.load().position.x, 19_999.0);
    }
}
