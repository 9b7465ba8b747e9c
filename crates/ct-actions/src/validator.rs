// validator.rs — Ownership-scope validation for agent actions.
//
// Every entity an action references must belong, transitively, to the acting
// manager: a work order through its property, a bid through its work order's
// property, a vendor through an explicit vendor-property link. This is an
// authorization check, distinct from policy — policy asks "should the agent
// do this on its own", the validator asks "may this actor touch these
// entities at all". Each failing check yields its own Forbidden reason.

use uuid::Uuid;

use ct_domain::property::Property;
use ct_domain::repo::Repos;
use ct_domain::work_order::WorkOrder;

use crate::action::ActionKind;
use crate::error::ActionError;

/// Verify that every entity referenced by `kind` is inside `actor_id`'s
/// ownership scope.
pub fn validate_scope(kind: &ActionKind, actor_id: Uuid, repos: &Repos) -> Result<(), ActionError> {
    match kind {
        ActionKind::AssignVendor {
            work_order_id,
            vendor_id,
        } => {
            let work_order = owned_work_order(repos, *work_order_id, actor_id)?;
            require_vendor_link(repos, *vendor_id, work_order.property_id)?;
            Ok(())
        }

        ActionKind::CreateWorkOrder { property_id, .. } => {
            owned_property(repos, *property_id, actor_id).map(|_| ())
        }

        ActionKind::RequestBids {
            work_order_id,
            vendor_ids,
        } => {
            let work_order = owned_work_order(repos, *work_order_id, actor_id)?;
            for vendor_id in vendor_ids {
                require_vendor_link(repos, *vendor_id, work_order.property_id)?;
            }
            Ok(())
        }

        ActionKind::AcceptBid { bid_id } => {
            let bid = repos
                .bids
                .get(*bid_id)?
                .ok_or(ActionError::NotFound {
                    entity: "bid",
                    id: *bid_id,
                })?;
            owned_work_order(repos, bid.work_order_id, actor_id).map(|_| ())
        }

        ActionKind::SendMessage { thread_id, .. } => {
            let thread = repos
                .messages
                .get_thread(*thread_id)?
                .ok_or(ActionError::NotFound {
                    entity: "message thread",
                    id: *thread_id,
                })?;
            owned_property(repos, thread.property_id, actor_id).map(|_| ())
        }

        ActionKind::CreateComplianceTask { compliance_item_id } => {
            let item = repos
                .compliance
                .get(*compliance_item_id)?
                .ok_or(ActionError::NotFound {
                    entity: "compliance item",
                    id: *compliance_item_id,
                })?;
            owned_property(repos, item.property_id, actor_id).map(|_| ())
        }

        ActionKind::Escalate { property_id, .. } => {
            owned_property(repos, *property_id, actor_id).map(|_| ())
        }
    }
}

/// The property, if it exists and is managed by the actor.
fn owned_property(
    repos: &Repos,
    property_id: Uuid,
    actor_id: Uuid,
) -> Result<Property, ActionError> {
    let property = repos
        .properties
        .get(property_id)?
        .ok_or(ActionError::NotFound {
            entity: "property",
            id: property_id,
        })?;
    if property.manager_id != actor_id {
        return Err(ActionError::Forbidden(format!(
            "property {} is not managed by the acting manager",
            property_id
        )));
    }
    Ok(property)
}

/// The work order, if it exists and its property is managed by the actor.
fn owned_work_order(
    repos: &Repos,
    work_order_id: Uuid,
    actor_id: Uuid,
) -> Result<WorkOrder, ActionError> {
    let work_order = repos
        .work_orders
        .get(work_order_id)?
        .ok_or(ActionError::NotFound {
            entity: "work order",
            id: work_order_id,
        })?;
    let property = repos
        .properties
        .get(work_order.property_id)?
        .ok_or(ActionError::NotFound {
            entity: "property",
            id: work_order.property_id,
        })?;
    if property.manager_id != actor_id {
        return Err(ActionError::Forbidden(format!(
            "work order {} belongs to a property the acting manager does not manage",
            work_order_id
        )));
    }
    Ok(work_order)
}

/// The vendor must exist and be linked to (approved for) the property.
fn require_vendor_link(
    repos: &Repos,
    vendor_id: Uuid,
    property_id: Uuid,
) -> Result<(), ActionError> {
    if repos.vendors.get(vendor_id)?.is_none() {
        return Err(ActionError::NotFound {
            entity: "vendor",
            id: vendor_id,
        });
    }
    if !repos.vendors.linked_to_property(vendor_id, property_id)? {
        return Err(ActionError::Forbidden(format!(
            "vendor {} is not linked to property {}",
            vendor_id, property_id
        )));
    }
    Ok(())
}
