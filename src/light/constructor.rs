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

//! A special container that is able to create lights by their type name.

use crate::light::{Light, PointLight, SpotLight, SunLight};
use fxhash::FxHashMap;
use umbra_core::{parking_lot::Mutex, ImmutableString};

/// Gives a light type a unique, stable name used as its key in [`LightConstructorContainer`].
pub trait TypeNameProvider {
    fn type_name() -> &'static str;
}

/// A simple type alias for boxed light constructor.
pub type LightConstructor = Box<dyn FnMut() -> Light + Send>;

#[derive(Default)]
pub struct LightConstructorContainer {
    map: Mutex<FxHashMap<ImmutableString, LightConstructor>>,
}

impl LightConstructorContainer {
    /// Creates default container with constructors for the built-in light types.
    pub fn new() -> Self {
        let container = Self::default();

        container.add::<PointLight>();
        container.add::<SpotLight>();
        container.add::<SunLight>();

        container
    }

    /// Adds a constructor that creates the default instance of the type. Returns `false` if the
    /// type was registered already, the existing constructor is kept in this case.
    pub fn add<T>(&self) -> bool
    where
        T: TypeNameProvider + Default + Into<Light>,
    {
        let mut map = self.map.lock();
        if map.contains_key(T::type_name()) {
            return false;
        }
        let constructor: LightConstructor = Box::new(|| T::default().into());
        map.insert(ImmutableString::new(T::type_name()), constructor);
        true
    }

    /// Adds custom constructor and returns the previous constructor for the name (if any).
    pub fn add_custom<F>(&self, type_name: &str, constructor: F) -> Option<LightConstructor>
    where
        F: FnMut() -> Light + Send + 'static,
    {
        self.map
            .lock()
            .insert(ImmutableString::new(type_name), Box::new(constructor))
    }

    pub fn remove(&self, type_name: &str) -> Option<LightConstructor> {
        self.map.lock().remove(type_name)
    }

    /// Makes an attempt to create a light using provided type name. It may fail if there is no
    /// constructor for the name.
    pub fn try_create(&self, type_name: &str) -> Option<Light> {
        self.map.lock().get_mut(type_name).map(|constructor| constructor())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.map.lock().contains_key(type_name)
    }

    /// Returns total amount of constructors.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use umbra_core::color::Color;

    #[test]
    fn test_builtins() {
        let container = LightConstructorContainer::new();
        assert_eq!(container.len(), 3);
        assert!(!container.add::<SunLight>());

        assert!(matches!(container.try_create("PointLight"), Some(Light::Point(_))));
        assert!(matches!(container.try_create("SpotLight"), Some(Light::Spot(_))));
        assert!(matches!(container.try_create("SunLight"), Some(Light::Sun(_))));
        assert!(container.try_create("AreaLight").is_none());
    }

    #[test]
    fn test_custom_and_remove() {
        let container = LightConstructorContainer::new();
        let mut created = 0;
        container.add_custom("RedLamp", move || {
            created += 1;
            let mut light = PointLight::default();
            light.base.color = Color::RED;
            light.radius = created as f32;
            Light::Point(light)
        });
        assert_eq!(container.len(), 4);

        match container.try_create("RedLamp") {
            Some(Light::Point(light)) => assert_eq!(light.base.color, Color::RED),
            _ => panic!("custom constructor must be used"),
        }
        // Constructors are stateful closures.
        match container.try_create("RedLamp") {
            Some(Light::Point(light)) => assert_eq!(light.radius, 2.0),
            _ => unreachable!(),
        }

        assert!(container.remove("RedLamp").is_some());
        assert!(!container.contains("RedLamp"));
        assert!(container.remove("PointLight").is_some());
        assert!(container.try_create("PointLight").is_none());
    }
}
