//! Node types every repository starts with.

/// CND for the built-in namespaces and types, registered on bootstrap.
pub const BUILTIN_NODE_TYPES: &str = r"
<'jcr'='http://www.jcp.org/jcr/1.0'>
<'nt'='http://www.jcp.org/jcr/nt/1.0'>
<'mix'='http://www.jcp.org/jcr/mix/1.0'>
<'rep'='internal'>

[nt:base] abstract
  - jcr:primaryType (name) mandatory autocreated protected COMPUTE
  - jcr:mixinTypes (name) protected multiple COMPUTE

[nt:unstructured] > nt:base orderable
  - * (undefined) multiple
  - * (undefined)
  + * (nt:base) = nt:unstructured sns VERSION

[mix:referenceable] mixin
  - jcr:uuid (string) mandatory autocreated protected INITIALIZE

[mix:title] mixin
  - jcr:title (string)
  - jcr:description (string)

[nt:hierarchyNode] > nt:base abstract
  - jcr:created (date) autocreated protected INITIALIZE
  - jcr:createdBy (string) autocreated protected INITIALIZE

[nt:folder] > nt:hierarchyNode
  + * (nt:hierarchyNode) VERSION

[nt:file] > nt:hierarchyNode primaryitem jcr:content
  + jcr:content (nt:base) mandatory

[nt:resource] > nt:base, mix:referenceable primaryitem jcr:data
  - jcr:data (binary) mandatory
  - jcr:mimeType (string)
  - jcr:encoding (string)
  - jcr:lastModified (date)

[nt:nodeType] > nt:base
  - jcr:nodeTypeName (name) mandatory protected
  - jcr:supertypes (name) protected multiple
  - jcr:isAbstract (boolean) mandatory protected
  - jcr:isMixin (boolean) mandatory protected
  - jcr:hasOrderableChildNodes (boolean) mandatory protected
  - jcr:primaryItemName (name) protected
  + jcr:propertyDefinition (nt:propertyDefinition) = nt:propertyDefinition protected sns
  + jcr:childNodeDefinition (nt:childNodeDefinition) = nt:childNodeDefinition protected sns

[nt:propertyDefinition] > nt:base
  - jcr:name (string) protected
  - jcr:autoCreated (boolean) mandatory protected
  - jcr:mandatory (boolean) mandatory protected
  - jcr:protected (boolean) mandatory protected
  - jcr:requiredType (string) mandatory protected
      < 'STRING', 'BINARY', 'LONG', 'DOUBLE', 'DECIMAL', 'DATE', 'BOOLEAN',
        'NAME', 'PATH', 'REFERENCE', 'WEAKREFERENCE', 'URI', 'UNDEFINED'
  - jcr:valueConstraints (string) protected multiple
  - jcr:defaultValues (undefined) protected multiple
  - jcr:multiple (boolean) mandatory protected

[nt:childNodeDefinition] > nt:base
  - jcr:name (string) protected
  - jcr:autoCreated (boolean) mandatory protected
  - jcr:mandatory (boolean) mandatory protected
  - jcr:protected (boolean) mandatory protected
  - jcr:requiredPrimaryTypes (name) protected multiple
  - jcr:defaultPrimaryType (name) protected
  - jcr:sameNameSiblings (boolean) mandatory protected

[rep:NodeTypeNamespace] > nt:base
  - jcr:uri (uri) mandatory protected
  + * (nt:nodeType) = nt:nodeType protected

[rep:nodeTypes] > nt:base
  + * (rep:NodeTypeNamespace) = rep:NodeTypeNamespace protected

[rep:system] > nt:base orderable
  + jcr:nodeTypes (rep:nodeTypes) = rep:nodeTypes protected
  + * (nt:base) = nt:unstructured sns
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnd;

    #[test]
    fn builtin_types_parse() {
        let doc = cnd::parse_document(BUILTIN_NODE_TYPES).unwrap();
        assert_eq!(doc.namespaces.len(), 4);
        let names: Vec<String> = doc.types.iter().map(|t| t.name.to_string()).collect();
        for expected in ["nt:base", "nt:unstructured", "nt:nodeType", "rep:system"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        let unstructured = doc.types.iter().find(|t| t.name.to_string() == "nt:unstructured").unwrap();
        assert_eq!(unstructured.properties.len(), 2);
        assert!(unstructured.children[0].same_name_siblings);
    }
}
