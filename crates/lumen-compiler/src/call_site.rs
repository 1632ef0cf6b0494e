//! Per-site inline caches.
//!
//! Every global call, method invocation and member read/write in generated
//! code is routed through a [`CallSite`]. The site is created at generation
//! time and owned by the compiled function; its [`InlineCache`] is created
//! the first time the site executes and is shared by every later execution,
//! including re-entrant ones.
//!
//! A cache holds at most one [`CacheStrategy`]. The executing VM checks the
//! strategy's guard; on a hit it takes the cached shortcut, on a miss it runs
//! the general lookup and rebinds. Both paths produce the same result.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use lumen_core::{Callable, ObjectHandle, Span};

/// The shape of a dynamic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// Call of a global function by bare name.
    GlobalCall,
    /// `receiver.name(args...)`
    InvokeMember,
    /// `object.name`
    GetMember,
    /// `object.name = value`
    SetMember,
}

/// Static description of one site, fixed at generation time.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSiteInfo {
    pub kind: SiteKind,
    /// Global or member name.
    pub name: Rc<str>,
    /// Argument count for call kinds, zero otherwise.
    pub argc: u8,
    pub span: Span,
}

/// The cached dispatch decision of a site.
#[derive(Debug, Clone, Default)]
pub enum CacheStrategy {
    #[default]
    Uninitialized,
    /// Guard: the callee read from the global object is this object.
    GlobalCall {
        callee: ObjectHandle,
        target: Callable,
    },
    /// Guard: same receiver and no property added or removed anywhere since
    /// the fill. `holder` owns the property on the receiver's chain.
    PropertyLoad {
        receiver: ObjectHandle,
        epoch: u64,
        holder: ObjectHandle,
    },
    /// Guard: same receiver and shape epoch; the receiver has a writable own
    /// data property of that name.
    PropertyStore { receiver: ObjectHandle, epoch: u64 },
    /// Guard as for `PropertyLoad`; the method is read from `holder`.
    MethodCall {
        receiver: ObjectHandle,
        epoch: u64,
        holder: ObjectHandle,
    },
}

impl CacheStrategy {
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, CacheStrategy::Uninitialized)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheStrategy::Uninitialized => "uninitialized",
            CacheStrategy::GlobalCall { .. } => "global-call",
            CacheStrategy::PropertyLoad { .. } => "property-load",
            CacheStrategy::PropertyStore { .. } => "property-store",
            CacheStrategy::MethodCall { .. } => "method-call",
        }
    }
}

/// Mutable cache state of one site.
#[derive(Debug, Clone, Default)]
pub struct InlineCache {
    pub strategy: CacheStrategy,
    pub hits: u64,
    pub misses: u64,
}

impl InlineCache {
    #[inline]
    pub fn record_hit(&mut self) {
        self.hits = self.hits.saturating_add(1);
    }

    /// Count a miss and install the strategy found by the slow path.
    pub fn rebind(&mut self, strategy: CacheStrategy) {
        self.misses = self.misses.saturating_add(1);
        self.strategy = strategy;
    }

    /// Count a miss that could not be cached (e.g. a primitive receiver).
    pub fn record_uncacheable(&mut self) {
        self.misses = self.misses.saturating_add(1);
        self.strategy = CacheStrategy::Uninitialized;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Hit and miss counters of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::ops::Add for CacheStats {
    type Output = CacheStats;

    fn add(self, rhs: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + rhs.hits,
            misses: self.misses + rhs.misses,
        }
    }
}

/// One dynamic operation site in generated code.
pub struct CallSite {
    info: CallSiteInfo,
    cache: RefCell<Option<InlineCache>>,
}

impl CallSite {
    pub fn new(info: CallSiteInfo) -> Self {
        Self {
            info,
            cache: RefCell::new(None),
        }
    }

    pub fn info(&self) -> &CallSiteInfo {
        &self.info
    }

    /// Whether the site has executed at least once.
    pub fn is_initialized(&self) -> bool {
        self.cache.borrow().is_some()
    }

    /// The cache, created on first access.
    pub fn cache_mut(&self) -> RefMut<'_, InlineCache> {
        RefMut::map(self.cache.borrow_mut(), |slot| {
            slot.get_or_insert_with(InlineCache::default)
        })
    }

    /// The cache if it exists.
    pub fn cache(&self) -> Option<Ref<'_, InlineCache>> {
        Ref::filter_map(self.cache.borrow(), Option::as_ref).ok()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache().map(|c| c.stats()).unwrap_or_default()
    }

    /// Drop the cache; the next execution starts cold.
    pub fn reset(&self) {
        *self.cache.borrow_mut() = None;
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = self
            .cache()
            .map_or("cold", |cache| cache.strategy.name());
        f.debug_struct("CallSite")
            .field("kind", &self.info.kind)
            .field("name", &self.info.name)
            .field("argc", &self.info.argc)
            .field("strategy", &strategy)
            .finish()
    }
}
