//! The component-id space is process-global, so this boundary check lives
//! in its own test binary where it owns the whole id range.

use tickworld::{component_id_of, Component, ComponentId};

macro_rules! limit_components {
    ($($name:ident),+ $(,)?) => {
        $(
            struct $name;
            impl Component for $name {}
        )+

        fn register_all() -> Vec<ComponentId> {
            vec![$(component_id_of::<$name>()),+]
        }
    };
}

limit_components!(
    C00, C01, C02, C03, C04, C05, C06, C07, C08, C09, C10, C11, C12, C13, C14, C15, C16, C17,
    C18, C19, C20, C21, C22, C23, C24, C25, C26, C27, C28, C29, C30, C31, C32, C33, C34, C35,
    C36, C37, C38, C39, C40, C41, C42, C43, C44, C45, C46, C47, C48, C49, C50, C51, C52, C53,
    C54, C55, C56, C57, C58, C59, C60, C61, C62, C63,
);

struct Overflow;
impl Component for Overflow {}

#[test]
#[should_panic(expected = "component type limit exceeded")]
fn the_sixty_fifth_component_type_aborts() {
    let ids = register_all();
    assert_eq!(ids, (0..64).collect::<Vec<ComponentId>>());

    // The 64th distinct type was accepted; the 65th must not be.
    component_id_of::<Overflow>();
}
