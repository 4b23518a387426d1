use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{
    BoolCodec, Codec, Color4Codec, ColorCodec, F32Codec, Flag, FlagCodec, I16Codec, I32Codec,
    QuaternionCodec, StringCodec, TransformCodec, U8Codec, U16Codec, Vector2DCodec, VectorCodec,
};
use crate::error::{Error, Result};
use crate::offset::OffsetChain;

/// Builds the codec for one marshaler. Receives the chain so that codecs can
/// depend on offset metadata (flag patterns).
pub type CodecFactory<T> =
    Arc<dyn Fn(&OffsetChain) -> Result<Arc<dyn Codec<Value = T>>> + Send + Sync>;

/// Value type to codec lookup.
#[derive(Default)]
pub struct CodecRegistry {
    factories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a codec for every built-in value type.
    pub fn with_defaults(string_length: usize) -> Self {
        let mut registry = Self::new();
        registry.insert_defaults(string_length);
        registry
    }

    fn insert_defaults(&mut self, string_length: usize) {
        self.insert_codec(BoolCodec);
        self.insert_codec(U8Codec);
        self.insert_codec(I16Codec);
        self.insert_codec(U16Codec);
        self.insert_codec(I32Codec);
        self.insert_codec(F32Codec);
        self.insert_codec(Vector2DCodec);
        self.insert_codec(VectorCodec);
        self.insert_codec(QuaternionCodec);
        self.insert_codec(TransformCodec);
        self.insert_codec(ColorCodec);
        self.insert_codec(Color4Codec);
        self.insert_codec(StringCodec::new(string_length, true));
        self.insert::<Flag>(Arc::new(|chain: &OffsetChain| -> Result<Arc<dyn Codec<Value = Flag>>> {
            let pattern = chain.flag_pattern().ok_or_else(|| {
                Error::InvalidOffset(format!("{} ({}) is not a flag offset", chain.name(), chain))
            })?;
            Ok(Arc::new(FlagCodec::new(pattern.clone())))
        }));
    }

    /// Register a factory for `T`. Each type can be registered once.
    pub fn register<T, F>(&mut self, factory: F) -> Result<()>
    where
        T: 'static,
        F: Fn(&OffsetChain) -> Result<Arc<dyn Codec<Value = T>>> + Send + Sync + 'static,
    {
        if self.contains::<T>() {
            return Err(Error::CodecAlreadyRegistered(type_name::<T>()));
        }
        self.insert::<T>(Arc::new(factory));
        Ok(())
    }

    /// Register a codec that does not depend on the offset chain.
    pub fn register_codec<C>(&mut self, codec: C) -> Result<()>
    where
        C: Codec + 'static,
        C::Value: 'static,
    {
        if self.contains::<C::Value>() {
            return Err(Error::CodecAlreadyRegistered(type_name::<C::Value>()));
        }
        self.insert_codec(codec);
        Ok(())
    }

    fn insert<T: 'static>(&mut self, factory: CodecFactory<T>) {
        self.factories.insert(TypeId::of::<T>(), Box::new(factory));
    }

    fn insert_codec<C>(&mut self, codec: C)
    where
        C: Codec + 'static,
        C::Value: 'static,
    {
        let codec: Arc<dyn Codec<Value = C::Value>> = Arc::new(codec);
        self.insert::<C::Value>(Arc::new(
            move |_: &OffsetChain| -> Result<Arc<dyn Codec<Value = C::Value>>> {
                Ok(Arc::clone(&codec))
            },
        ));
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<T>())
    }

    pub fn codec_for<T: 'static>(&self, chain: &OffsetChain) -> Result<Arc<dyn Codec<Value = T>>> {
        let factory = self
            .factories
            .get(&TypeId::of::<T>())
            .and_then(|factory| factory.downcast_ref::<CodecFactory<T>>())
            .ok_or(Error::NoCodec(type_name::<T>()))?;
        factory(chain)
    }
}
