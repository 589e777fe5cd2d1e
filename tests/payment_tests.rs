/// Checkout simulator tests
/// Runs the staged flow on paused tokio time against in-memory storage
use chrono::NaiveDate;
use maos_amigas_client::client_store::{keys, ClientStore};
use maos_amigas_client::config::Config;
use maos_amigas_client::context::AppContext;
use maos_amigas_client::models::UserData;
use maos_amigas_client::notices::{Notice, NoticeLevel, Notices};
use maos_amigas_client::payment::{
    CardField, Checkout, CheckoutState, PaymentMethod, PaymentRecord, FALLBACK_PIX_KEY,
};
use maos_amigas_client::storage::MemoryStorage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

fn create_context() -> (AppContext, UnboundedReceiver<Notice>) {
    let config = Config {
        api_base_url: "http://127.0.0.1:9".to_string(),
        viacep_base_url: "http://127.0.0.1:9".to_string(),
        payment_stage_delay_ms: 800,
        ..Default::default()
    };
    let (notices, rx) = Notices::channel();
    let ctx = AppContext::new(config, Arc::new(MemoryStorage::new()), notices).unwrap();
    (ctx, rx)
}

fn select(store: &ClientStore, ids: &[&str]) {
    let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    store.set_selected_services(&ids).unwrap();
}

async fn loaded_checkout(ctx: &AppContext) -> Checkout {
    let mut checkout =
        Checkout::new(ctx).with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    checkout.load().await;
    checkout
}

fn fill_card(checkout: &mut Checkout) {
    checkout.set_card_field(CardField::Number, "4111111111111111");
    checkout.set_card_field(CardField::Holder, "Maria Souza");
    checkout.set_card_field(CardField::Expiry, "1230");
    checkout.set_card_field(CardField::Cvv, "123");
}

#[cfg(test)]
mod checkout_flow_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_load_walks_three_stages() {
        let (ctx, _rx) = create_context();
        select(
            &ctx.store,
            &["consulta-psicologica", "consulta-medica", "massagem"],
        );

        let started = Instant::now();
        let checkout = loaded_checkout(&ctx).await;

        assert_eq!(started.elapsed(), Duration::from_millis(2400));
        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert_eq!(checkout.caption(), None);
        assert_eq!(checkout.cart().len(), 2);
        assert_eq!(checkout.total_display(), "R$ 200,00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_payment_settles_and_clears_cart() {
        let (ctx, mut rx) = create_context();
        select(&ctx.store, &["consulta-psicologica", "orientacao-juridica"]);
        let mut checkout = loaded_checkout(&ctx).await;

        checkout.choose_method(PaymentMethod::Card);
        fill_card(&mut checkout);
        assert_eq!(checkout.card().number, "4111 1111 1111 1111");
        assert_eq!(checkout.card().expiry, "12/30");

        let started = Instant::now();
        let record = checkout.submit().await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(2400));
        assert_eq!(checkout.state(), CheckoutState::Settled);
        assert_eq!(record.total, "140.00");
        assert_eq!(record.status, "aprovado");
        assert_eq!(record.card_last_digits.as_deref(), Some("1111"));
        assert_eq!(record.services.len(), 2);

        let stored: PaymentRecord = ctx.store.read(keys::LAST_PAYMENT).unwrap();
        assert_eq!(stored, record);
        assert!(ctx.store.selected_services().is_empty());

        let notices: Vec<Notice> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(notices
            .iter()
            .any(|n| n.level == NoticeLevel::Success && n.title == "Pagamento confirmado!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_card_returns_to_method_chosen() {
        let (ctx, _rx) = create_context();
        select(&ctx.store, &["consulta-medica"]);
        let mut checkout = loaded_checkout(&ctx).await;

        checkout.choose_method(PaymentMethod::Card);
        checkout.set_card_field(CardField::Number, "4111111111111111");
        checkout.set_card_field(CardField::Expiry, "0926");

        let err = checkout.submit().await;

        assert!(err.is_err());
        assert_eq!(checkout.state(), CheckoutState::MethodChosen);
        assert_eq!(checkout.card_error(CardField::Expiry), Some("Cartão vencido"));
        assert!(checkout.card_error(CardField::Cvv).is_some());
        assert!(ctx.store.read::<PaymentRecord>(keys::LAST_PAYMENT).is_none());
        assert_eq!(ctx.store.selected_services(), vec!["consulta-medica".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_cannot_be_paid() {
        let (ctx, mut rx) = create_context();
        let mut checkout = loaded_checkout(&ctx).await;
        checkout.choose_method(PaymentMethod::Boleto);

        let started = Instant::now();
        assert!(checkout.submit().await.is_err());

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(checkout.state(), CheckoutState::MethodChosen);
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.description.as_deref(), Some("Nenhum serviço selecionado"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_method_stays_idle() {
        let (ctx, _rx) = create_context();
        select(&ctx.store, &["atendimento-social"]);
        let mut checkout = loaded_checkout(&ctx).await;

        assert!(checkout.submit().await.is_err());
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pix_payment_records_key() {
        let (ctx, _rx) = create_context();
        select(&ctx.store, &["terapia-ocupacional"]);
        ctx.store
            .set_user_data(&UserData {
                email: Some("maria@example.com".to_string()),
                telefone: Some("(11) 98765-4321".to_string()),
                ..Default::default()
            })
            .unwrap();
        let mut checkout = loaded_checkout(&ctx).await;

        checkout.choose_method_with_rng(PaymentMethod::Pix, &mut StdRng::seed_from_u64(7));
        let key = checkout.pix_key().unwrap().to_string();
        assert!(["maria@example.com", "(11) 98765-4321", FALLBACK_PIX_KEY].contains(&key.as_str()));

        let record = checkout.submit().await.unwrap();
        assert_eq!(record.method, PaymentMethod::Pix);
        assert_eq!(record.pix_key, Some(key));
        assert_eq!(record.card_last_digits, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_checkout_rejects_second_submit() {
        let (ctx, _rx) = create_context();
        select(&ctx.store, &["atendimento-social"]);
        let mut checkout = loaded_checkout(&ctx).await;
        checkout.choose_method(PaymentMethod::Boleto);
        checkout.submit().await.unwrap();

        checkout.choose_method(PaymentMethod::Pix);
        assert_eq!(checkout.method(), Some(PaymentMethod::Boleto));
        assert!(checkout.submit().await.is_err());
        assert_eq!(checkout.state(), CheckoutState::Settled);
        assert!(checkout.boleto_advisory().contains("22/10/2026"));
    }
}
