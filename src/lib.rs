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

//! Deferred real-time 3D rendering core.
//!
//! [`renderer::Renderer`] owns everything a frame needs: meshes, lights with their shadow maps,
//! a G-buffer, a forward pass, a chain of screen-space effects and the final composite. Meshes
//! can be changed from any thread, everything else is reached from other threads through
//! [`scheduler::RenderScheduler`].

#![allow(clippy::too_many_arguments)]

pub mod composite;
pub mod context;
pub mod effects;
pub mod forward;
pub mod gbuffer;
pub mod light;
pub mod material;
pub mod mesh;
pub mod renderer;
pub mod scheduler;
pub mod settings;
pub mod shader;
pub mod stats;
pub mod texture_registry;
pub mod transform;
pub mod viewport;

pub use umbra_core as core;
pub use umbra_graphics as graphics;
#[cfg(feature = "gl")]
pub use umbra_graphics_gl as graphics_gl;
