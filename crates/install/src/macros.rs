//! `with_*` setter generation for builder-style structs

macro_rules! with_setters {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        paste::paste! {
            impl $name {
                $(
                    #[must_use]
                    pub fn [<with_ $field>](mut self, $field: $ty) -> Self {
                        self.$field = $field;
                        self
                    }
                )*
            }
        }
    };
}
