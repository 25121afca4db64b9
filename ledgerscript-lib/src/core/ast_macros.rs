/// generates a type for an enum node, which only contains variants with one unnamed field,
/// which are further nodes. It implements From<T> for each child type, and it implements
/// Compilable and TypeInferable by delegating to the child
macro_rules! mk_enum_node{
    ($(#[$meta:meta])* $name:ident $(, $child_ty:tt)+) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, AstNode)]
        pub enum $name {
            $($child_ty($child_ty),)*
        }

    $(
        impl From<$child_ty> for $name {
            fn from(child: $child_ty) -> Self {
                Self::$child_ty(child)
            }
        }
    )*

        impl crate::compiler::Compilable for $name {
            fn compile(
                &self,
                builder: &mut crate::core::ByteCodeBuilder<'_>,
                analysis: &crate::analysis::Analysis,
            ) -> crate::compiler::Result<()> {
                match self {
                    $(Self::$child_ty(t) => t.compile(builder, analysis),)*
                }
            }
        }

        impl crate::analysis::TypeInferable for $name {
            fn infer_types(
                &self,
                analyser: &mut crate::analysis::Analyser<'_>,
                expected: Option<&crate::core::TypeId>,
            ) -> Option<crate::core::TypeId> {
                match self {
                    $(Self::$child_ty(t) => t.infer_types(analyser, expected),)*
                }
            }
        }
    };
}
pub(crate) use mk_enum_node;
