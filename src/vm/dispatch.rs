//! Call-site dispatch through inline caches.
//!
//! Each operation checks its site's guard, takes the cached shortcut on a
//! hit and otherwise runs the general lookup and rebinds. The cache borrow
//! is released before any script or native code runs, so re-entrant
//! executions of the same site see a consistent cache.

use std::rc::Rc;

use lumen_compiler::{CacheStrategy, CallSite};
use lumen_core::{ObjectHandle, PropertyWrite, RuntimeError, Value};
use tracing::trace;

use super::{Result, Vm};
use crate::config::CacheMode;

impl Vm<'_> {
    /// `receiver.name`
    pub(super) fn get_member(&mut self, site: &CallSite, receiver: Value) -> Result<Value> {
        let name = Rc::clone(&site.info().name);
        let Value::Object(handle) = receiver else {
            self.uncacheable(site);
            return self.primitive_member(&receiver, &name);
        };
        match self.member_holder(site, handle, &name, false) {
            Some(holder) => {
                let read = self.heap.read_own(holder, &name);
                self.resolve_read(read, receiver)
            }
            None => Ok(Value::Undefined),
        }
    }

    /// `receiver.name(args...)`
    pub(super) fn invoke_member(
        &mut self,
        site: &CallSite,
        receiver: Value,
        args: Vec<Value>,
    ) -> Result<Value> {
        let name = Rc::clone(&site.info().name);
        let method = match receiver {
            Value::Object(handle) => match self.member_holder(site, handle, &name, true) {
                Some(holder) => {
                    let read = self.heap.read_own(holder, &name);
                    self.resolve_read(read, receiver.clone())?
                }
                None => Value::Undefined,
            },
            _ => {
                self.uncacheable(site);
                self.primitive_member(&receiver, &name)?
            }
        };
        self.call_value(method, receiver, args, &name)
    }

    /// `receiver.name = value`
    pub(super) fn set_member(
        &mut self,
        site: &CallSite,
        receiver: Value,
        value: Value,
    ) -> Result<()> {
        let name = Rc::clone(&site.info().name);
        let handle = match receiver {
            Value::Object(handle) => handle,
            other if other.is_nullish() => {
                return Err(RuntimeError::type_error(format!(
                    "cannot set property '{name}' of {other}"
                )));
            }
            // Writes to primitives are dropped.
            _ => {
                self.uncacheable(site);
                return Ok(());
            }
        };

        let epoch = self.heap.shape_epoch();
        let hit = self.cached(site, |strategy| match strategy {
            CacheStrategy::PropertyStore {
                receiver,
                epoch: cached,
            } if *receiver == handle && *cached == epoch => Some(()),
            _ => None,
        });
        if hit.is_some() && self.heap.overwrite_own(handle, &name, value.clone()) {
            return Ok(());
        }

        match self.heap.set_property(handle, &name, value.clone()) {
            PropertyWrite::Stored => {
                let strategy = CacheStrategy::PropertyStore {
                    receiver: handle,
                    epoch: self.heap.shape_epoch(),
                };
                self.rebind(site, strategy);
                Ok(())
            }
            PropertyWrite::Ignored => {
                self.uncacheable(site);
                Ok(())
            }
            PropertyWrite::Setter(setter) => {
                self.uncacheable(site);
                self.call_object(setter, Value::Object(handle), vec![value])
                    .map(drop)
            }
        }
    }

    /// `name(args...)` for a global `name`. `callee` was read by the
    /// preceding `GetGlobal`.
    pub(super) fn call_global(
        &mut self,
        site: &CallSite,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<Value> {
        let Value::Object(handle) = callee else {
            self.uncacheable(site);
            return Err(RuntimeError::NotCallable {
                what: site.info().name.to_string(),
            });
        };

        let cached = self.cached(site, |strategy| match strategy {
            CacheStrategy::GlobalCall { callee, target } if *callee == handle => {
                Some(target.clone())
            }
            _ => None,
        });
        let target = match cached {
            Some(target) => target,
            None => match self.callable_of(handle) {
                Some(target) => {
                    self.rebind(
                        site,
                        CacheStrategy::GlobalCall {
                            callee: handle,
                            target: target.clone(),
                        },
                    );
                    target
                }
                None => {
                    self.uncacheable(site);
                    return Err(RuntimeError::NotCallable {
                        what: site.info().name.to_string(),
                    });
                }
            },
        };
        let this = Value::Object(self.realm.global);
        self.call_callable(handle, target, this, args)
    }

    /// The object on `handle`'s chain that owns `name`, through the site's
    /// `PropertyLoad` or `MethodCall` strategy.
    fn member_holder(
        &mut self,
        site: &CallSite,
        handle: ObjectHandle,
        name: &str,
        method: bool,
    ) -> Option<ObjectHandle> {
        let epoch = self.heap.shape_epoch();
        let cached = self.cached(site, |strategy| match strategy {
            CacheStrategy::PropertyLoad {
                receiver,
                epoch: cached,
                holder,
            } if !method && *receiver == handle && *cached == epoch => Some(*holder),
            CacheStrategy::MethodCall {
                receiver,
                epoch: cached,
                holder,
            } if method && *receiver == handle && *cached == epoch => Some(*holder),
            _ => None,
        });
        if cached.is_some() {
            return cached;
        }

        let holder = self.heap.find_holder(handle, name);
        match holder {
            Some(holder) if method => self.rebind(
                site,
                CacheStrategy::MethodCall {
                    receiver: handle,
                    epoch,
                    holder,
                },
            ),
            Some(holder) => self.rebind(
                site,
                CacheStrategy::PropertyLoad {
                    receiver: handle,
                    epoch,
                    holder,
                },
            ),
            None => self.uncacheable(site),
        }
        holder
    }

    /// Members of primitives: `length` of strings, otherwise whatever
    /// `Object.prototype` provides.
    fn primitive_member(&mut self, receiver: &Value, name: &str) -> Result<Value> {
        match receiver {
            Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
                "cannot read property '{name}' of {receiver}"
            ))),
            Value::String(s) if name == "length" => {
                Ok(Value::Number(s.chars().count() as f64))
            }
            _ => {
                let read = self.heap.get_property(self.realm.object_prototype, name);
                self.resolve_read(read, receiver.clone())
            }
        }
    }

    // ==========================================================================
    // Cache bookkeeping
    // ==========================================================================

    /// Run `probe` against the site's strategy and count a hit when it
    /// yields. Never hits unless caching is fully enabled.
    fn cached<T>(
        &self,
        site: &CallSite,
        probe: impl FnOnce(&CacheStrategy) -> Option<T>,
    ) -> Option<T> {
        if self.config.cache_mode != CacheMode::Enabled {
            return None;
        }
        let mut cache = site.cache_mut();
        let hit = probe(&cache.strategy)?;
        cache.record_hit();
        Some(hit)
    }

    fn rebind(&self, site: &CallSite, strategy: CacheStrategy) {
        if self.config.cache_mode == CacheMode::Disabled {
            return;
        }
        let info = site.info();
        trace!(
            site = %info.name,
            kind = ?info.kind,
            strategy = strategy.name(),
            "inline cache miss"
        );
        site.cache_mut().rebind(strategy);
    }

    fn uncacheable(&self, site: &CallSite) {
        if self.config.cache_mode == CacheMode::Disabled {
            return;
        }
        let info = site.info();
        trace!(site = %info.name, kind = ?info.kind, "inline cache miss, uncacheable");
        site.cache_mut().record_uncacheable();
    }
}
