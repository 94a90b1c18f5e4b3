use std::sync::Arc;

use sqlx::PgPool;

use finbook_auth::Hs256Jwt;
use finbook_fx::{RateProvider, SharedRateTable};
use finbook_store::{
    AccountRepo, BorrowingRepo, DashboardRepo, RateStore, ShiftRepo, StoreError, TransactionRepo,
    UserRepo,
};

/// Everything the handlers need, wired once at startup and shared via
/// `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub users: UserRepo,
    pub accounts: AccountRepo,
    pub transactions: TransactionRepo,
    pub borrowings: BorrowingRepo,
    pub shifts: ShiftRepo,
    pub dashboard: DashboardRepo,
    pub rate_store: RateStore,
    /// Live table behind the [`RateProvider`] every repo converts through.
    /// The rates endpoint writes here after persisting.
    pub rates: SharedRateTable,
    pub jwt: Arc<Hs256Jwt>,
}

pub async fn build_services(pool: PgPool, jwt_secret: &str) -> Result<AppServices, StoreError> {
    let rate_store = RateStore::new(pool.clone());
    let rates = SharedRateTable::new(rate_store.load().await?);
    let provider: Arc<dyn RateProvider> = Arc::new(rates.clone());

    Ok(AppServices {
        users: UserRepo::new(pool.clone()),
        accounts: AccountRepo::new(pool.clone(), provider.clone()),
        transactions: TransactionRepo::new(pool.clone(), provider.clone()),
        borrowings: BorrowingRepo::new(pool.clone(), provider.clone()),
        shifts: ShiftRepo::new(pool.clone(), provider.clone()),
        dashboard: DashboardRepo::new(pool, provider),
        rate_store,
        rates,
        jwt: Arc::new(Hs256Jwt::new(jwt_secret.as_bytes())),
    })
}
