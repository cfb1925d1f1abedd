// Базовые модули
pub mod config;
pub mod error;
pub mod metrics;

// Состояние: snapshot / store / mutators / selectors
pub mod state;

// Профили на диске (JSON)
pub mod codec;

// Подписки на коммиты (router invalidation signal)
pub mod subs;

// Потребители сигнала: таблица маршрутов и HTTP API
pub mod router;
pub mod api;

// Удобные реэкспорты
pub use config::VeggieConfig;
pub use error::{Result, StoreError};
pub use router::{Reply, RouteCache, RouteTable};
pub use state::{
    mutators, selectors, Dispatched, Identity, Mutation, Override, OverridePatch, Profile,
    ProfileData, ProfileId, Service, ServiceDescriptor, ServiceId, Snapshot, Store,
};
