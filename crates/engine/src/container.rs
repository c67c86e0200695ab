//! Type-keyed constructor registry.
//!
//! The container maps a [`TypeKey`] to the one [`Provider`] able to construct it. The
//! plan compiler both reads it (a field whose type is provided is container-provided) and
//! writes it (compiled record generators are registered so enclosing records can depend
//! on them). Registration happens at route-registration time through `&mut self`; once
//! serving starts the container is only read.

use std::{fmt, sync::Arc};

use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use tracing::debug;
use wirebind_types::TypeKey;

use crate::{executor::RecordGenerator, record::Instance};

/// A constructor closure over positional, type-erased inputs.
pub type ProviderFn = Arc<dyn Fn(&ProviderArgs<'_>) -> Result<Instance> + Send + Sync>;

#[derive(Clone)]
pub enum Constructor {
    Function(ProviderFn),
    /// A compiled record generator.
    Record(Arc<RecordGenerator>),
}

/// A registered constructor: its inputs, in argument order, and its output.
#[derive(Clone)]
pub struct Provider {
    inputs: Vec<TypeKey>,
    output: TypeKey,
    constructor: Constructor,
}

impl Provider {
    pub fn new(inputs: Vec<TypeKey>, output: TypeKey, constructor: ProviderFn) -> Self {
        Self {
            inputs,
            output,
            constructor: Constructor::Function(constructor),
        }
    }

    pub(crate) fn record(generator: Arc<RecordGenerator>) -> Self {
        Self {
            inputs: generator.inputs().to_vec(),
            output: generator.ty(),
            constructor: Constructor::Record(generator),
        }
    }

    pub fn inputs(&self) -> &[TypeKey] {
        &self.inputs
    }

    pub fn output(&self) -> TypeKey {
        self.output
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// Whether invoking this provider reads the request.
    pub fn needs_route_context(&self) -> bool {
        match &self.constructor {
            Constructor::Function(_) => false,
            Constructor::Record(generator) => generator.needs_route_context(),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let constructor = match &self.constructor {
            Constructor::Function(_) => "function",
            Constructor::Record(_) => "record",
        };
        f.debug_struct("Provider")
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("constructor", &constructor)
            .finish()
    }
}

/// Positional inputs handed to a [`ProviderFn`].
pub struct ProviderArgs<'a> {
    output: TypeKey,
    values: &'a [Instance],
}

impl<'a> ProviderArgs<'a> {
    pub(crate) fn new(output: TypeKey, values: &'a [Instance]) -> Self {
        Self { output, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The input at `index`, downcast to `T`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| anyhow!("provider for `{}` has no input #{index}", self.output))?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| anyhow!("input #{index} of `{}` is not a `{}`", self.output, std::any::type_name::<T>()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    providers: IndexMap<TypeKey, Provider>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_type(&self, ty: &TypeKey) -> bool {
        self.providers.contains_key(ty)
    }

    pub fn provider(&self, ty: &TypeKey) -> Option<&Provider> {
        self.providers.get(ty)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.providers.keys().copied()
    }

    /// Registers `provider` unless its output type already has one. Returns whether it was
    /// registered.
    pub fn provide(&mut self, provider: Provider) -> bool {
        let output = provider.output();
        if self.providers.contains_key(&output) {
            debug!(ty = %output, "provider already registered; keeping the existing one");
            return false;
        }
        debug!(ty = %output, input_count = provider.inputs().len(), "provider registered");
        self.providers.insert(output, provider);
        true
    }

    /// Registers a ready-made value. Every execution receives the same shared instance.
    pub fn provide_value<T: Send + Sync + 'static>(&mut self, value: T) -> bool {
        let instance: Instance = Arc::new(value);
        self.provide(Provider::new(
            Vec::new(),
            TypeKey::of::<T>(),
            Arc::new(move |_: &ProviderArgs<'_>| -> Result<Instance> { Ok(Arc::clone(&instance)) }),
        ))
    }

    /// Registers a constructor without inputs. It runs once per execution that needs `T`.
    ///
    /// # Arguments
    /// * `constructor` - Builds a fresh `T`; an error aborts the execution with `BindError::Provider`
    ///
    /// # Returns
    /// `false` when `T` was already provided and the registration was ignored
    ///
    /// # Example
    /// ```rust
    /// use wirebind_engine::{Container, TypeKey};
    ///
    /// struct Clock(u64);
    ///
    /// let mut container = Container::new();
    /// assert!(container.provide_fn(|| Ok(Clock(0))));
    /// assert!(!container.provide_fn(|| Ok(Clock(1))));
    /// assert!(container.has_type(&TypeKey::of::<Clock>()));
    /// ```
    pub fn provide_fn<T, F>(&mut self, constructor: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        self.provide(Provider::new(
            Vec::new(),
            TypeKey::of::<T>(),
            Arc::new(move |_: &ProviderArgs<'_>| -> Result<Instance> { Ok(Arc::new(constructor()?)) }),
        ))
    }

    /// Registers a constructor of `T` that consumes the provided `A`.
    ///
    /// # Example
    /// ```rust
    /// use wirebind_engine::{Container, TypeKey};
    ///
    /// struct Database(&'static str);
    /// struct Repo(&'static str);
    ///
    /// let mut container = Container::new();
    /// container.provide_value(Database("pets"));
    /// container.provide_fn1(|database: &Database| Ok(Repo(database.0)));
    /// assert_eq!(container.provider(&TypeKey::of::<Repo>()).map(|provider| provider.inputs().len()), Some(1));
    /// ```
    pub fn provide_fn1<A, T, F>(&mut self, constructor: F) -> bool
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&A) -> Result<T> + Send + Sync + 'static,
    {
        self.provide(Provider::new(
            vec![TypeKey::of::<A>()],
            TypeKey::of::<T>(),
            Arc::new(move |args: &ProviderArgs<'_>| -> Result<Instance> {
                let first = args.get::<A>(0)?;
                Ok(Arc::new(constructor(&first)?))
            }),
        ))
    }

    /// Two-input form of [`Container::provide_fn1`]. Inputs are passed in declaration order.
    pub fn provide_fn2<A, B, T, F>(&mut self, constructor: F) -> bool
    where
        A: Send + Sync + 'static,
        B: Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&A, &B) -> Result<T> + Send + Sync + 'static,
    {
        self.provide(Provider::new(
            vec![TypeKey::of::<A>(), TypeKey::of::<B>()],
            TypeKey::of::<T>(),
            Arc::new(move |args: &ProviderArgs<'_>| -> Result<Instance> {
                let first = args.get::<A>(0)?;
                let second = args.get::<B>(1)?;
                Ok(Arc::new(constructor(&first, &second)?))
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Settings {
        prefix: String,
    }

    #[test]
    fn registration_is_idempotent_per_type() {
        let mut container = Container::new();
        assert!(container.provide_value(Settings { prefix: "a".into() }));
        assert!(!container.provide_value(Settings { prefix: "b".into() }));
        assert!(!container.provide_fn(|| Ok(Settings { prefix: "c".into() })));
        assert_eq!(container.len(), 1);
        assert!(container.has_type(&TypeKey::of::<Settings>()));
    }

    #[test]
    fn function_providers_receive_positional_inputs() {
        let mut container = Container::new();
        container.provide_fn1(|settings: &Settings| Ok(format!("{}-id", settings.prefix)));
        let provider = container.provider(&TypeKey::of::<String>()).unwrap();
        assert_eq!(provider.inputs(), &[TypeKey::of::<Settings>()]);

        let Constructor::Function(constructor) = provider.constructor() else {
            panic!("expected a function provider");
        };
        let inputs: Vec<Instance> = vec![Arc::new(Settings { prefix: "pet".into() })];
        let value = constructor(&ProviderArgs::new(provider.output(), &inputs)).unwrap();
        assert_eq!(value.downcast::<String>().unwrap().as_str(), "pet-id");

        let wrong: Vec<Instance> = vec![Arc::new(5_u8)];
        assert!(constructor(&ProviderArgs::new(provider.output(), &wrong)).is_err());
        assert!(constructor(&ProviderArgs::new(provider.output(), &[])).is_err());
    }
}
