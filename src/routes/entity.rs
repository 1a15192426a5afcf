//! Entity and listing routes built from the resolved model.
//! Every path is static up to its final `:id`, so listings such as `/factory/sprockets`
//! sit beside `/factory/:id` and static segments win.

use crate::config::{Operation, ResolvedModel};
use crate::handlers::entity::{
    create, delete as delete_handler, list, method_not_allowed, read, update, EntityRoute, ListingRoute,
};
use crate::state::AppState;
use axum::{
    routing::{get, post, put, MethodRouter},
    Extension, Router,
};

pub fn entity_routes(model: &ResolvedModel) -> Router<AppState> {
    let mut router = Router::new();

    for entity in &model.entities {
        let tag = Extension(EntityRoute(entity.id.clone()));
        let seg = &entity.path_segment;

        let mut by_id: Option<MethodRouter<AppState>> = None;
        if entity.allows(Operation::Read) {
            by_id = Some(get(read));
        }
        if entity.allows(Operation::Delete) {
            by_id = Some(match by_id {
                Some(r) => r.delete(delete_handler),
                None => axum::routing::delete(delete_handler),
            });
        }
        if let Some(r) = by_id {
            router = router.route(
                &format!("/{}/:id", seg),
                r.fallback(method_not_allowed).layer(tag.clone()),
            );
        }
        if entity.allows(Operation::Create) {
            router = router.route(
                &format!("/{}/create", seg),
                post(create).fallback(method_not_allowed).layer(tag.clone()),
            );
        }
        if entity.allows(Operation::Update) {
            router = router.route(
                &format!("/{}/update", seg),
                put(update).fallback(method_not_allowed).layer(tag),
            );
        }
    }

    for listing in &model.listings {
        router = router.route(
            &listing.path,
            get(list)
                .fallback(method_not_allowed)
                .layer(Extension(ListingRoute(listing.id.clone()))),
        );
    }
    router
}
